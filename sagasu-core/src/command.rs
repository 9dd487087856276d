//! シェルコマンド

use crate::parse::parse_address;
use crate::value::{TypedValue, ValueType};
use crate::{Result, ScanError};

/// アタッチ先の指定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachTarget {
    Pid(u32),
    Name(String),
}

/// シェルコマンド
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// プロセス一覧（名前で絞り込み可）
    Ps(Option<String>),
    /// アタッチ（引数なしならアタッチ中のプロセスを表示）
    Attach(Option<AttachTarget>),
    /// デタッチ（killなら強制終了してから）
    Detach { kill: bool },
    /// メモリ領域の一覧
    Regions { all: bool },
    /// ヘックスダンプ
    Dump {
        address: Option<usize>,
        length: Option<usize>,
    },
    /// 値の検索
    Search(TypedValue),
    /// 値の読み取り
    Read { ty: ValueType, address: usize },
    /// 値の書き込み
    Write { address: usize, value: TypedValue },
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

impl Command {
    /// コマンド文字列をパースする
    ///
    /// 文字列の値は残りの入力全体です（空白を含められます）。
    pub fn parse(input: &str) -> Result<Self> {
        let (name, rest) = split_word(input);

        match name {
            "ps" => Ok(Command::Ps(non_empty(rest))),
            "attach" | "a" => Ok(Command::Attach(non_empty(rest).map(|target| {
                match target.parse::<u32>() {
                    Ok(pid) => AttachTarget::Pid(pid),
                    Err(_) => AttachTarget::Name(target),
                }
            }))),
            "detach" => match rest {
                "" => Ok(Command::Detach { kill: false }),
                "kill" => Ok(Command::Detach { kill: true }),
                other => Err(unexpected("detach", other)),
            },
            "regions" => match rest {
                "" => Ok(Command::Regions { all: false }),
                "all" => Ok(Command::Regions { all: true }),
                other => Err(unexpected("regions", other)),
            },
            "dump" | "x" => {
                let (address, rest) = split_word(rest);
                let (length, rest) = split_word(rest);
                if !rest.is_empty() {
                    return Err(unexpected("dump", rest));
                }

                let address = optional(address, parse_address)?;
                let length = optional(length, parse_address)?;
                Ok(Command::Dump { address, length })
            }
            "search" | "find" => {
                let (ty, value) = split_word(rest);
                let ty = required(ty, "search <type> <value>")?.parse::<ValueType>()?;
                let value = required(value, "search <type> <value>")?;
                Ok(Command::Search(ty.parse_value(value)?))
            }
            "read" => {
                let (ty, rest) = split_word(rest);
                let (address, rest) = split_word(rest);
                if !rest.is_empty() {
                    return Err(unexpected("read", rest));
                }

                let ty = required(ty, "read <type> <address>")?.parse::<ValueType>()?;
                let address = parse_address(required(address, "read <type> <address>")?)?;
                Ok(Command::Read { ty, address })
            }
            "write" => {
                let (ty, rest) = split_word(rest);
                let (address, value) = split_word(rest);

                let usage = "write <type> <address> <value>";
                let ty = required(ty, usage)?.parse::<ValueType>()?;
                let address = parse_address(required(address, usage)?)?;
                let value = ty.parse_value(required(value, usage)?)?;
                Ok(Command::Write { address, value })
            }
            "help" | "h" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            "" => Err(ScanError::InvalidArgument("empty command".to_string())),
            other => Err(ScanError::InvalidArgument(format!(
                "unknown command '{}'",
                other
            ))),
        }
    }
}

/// 先頭の単語と残り（前後の空白は除く）に分ける
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (input, ""),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn optional<T>(s: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
    if s.is_empty() {
        Ok(None)
    } else {
        parse(s).map(Some)
    }
}

fn required<'a>(s: &'a str, usage: &str) -> Result<&'a str> {
    if s.is_empty() {
        Err(ScanError::InvalidArgument(format!("usage: {}", usage)))
    } else {
        Ok(s)
    }
}

fn unexpected(command: &str, arg: &str) -> ScanError {
    ScanError::InvalidArgument(format!("unexpected argument '{}' for {}", arg, command))
}
