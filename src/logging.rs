//! 로그 초기화 (env_logger → ~/Library/Logs/krtoaster/app.log)

use crate::config::home_dir;
use env_logger::{Builder, Env, Target, WriteStyle};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// 로그 파일 경로
pub fn log_path() -> PathBuf {
    home_dir()
        .join("Library")
        .join("Logs")
        .join("krtoaster")
        .join("app.log")
}

/// 이어쓰기 모드로 로그 파일 열기 (디렉토리 생성 포함)
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// 기본 info 레벨, RUST_LOG로 변경 가능. 파일을 열지 못하면 stderr로 출력
pub fn init() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            buf.timestamp_seconds(),
            record.level(),
            record.target(),
            record.args()
        )
    });

    let path = log_path();
    match open_log_file(&path) {
        Ok(file) => {
            builder
                .target(Target::Pipe(Box::new(file)))
                .write_style(WriteStyle::Never);
        }
        Err(e) => eprintln!("로그 파일을 열 수 없습니다 ({}): {}", path.display(), e),
    }

    if builder.try_init().is_err() {
        log::warn!("로거가 이미 초기화됨");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("app.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn test_log_path_location() {
        let path = log_path();
        assert!(path.ends_with("Library/Logs/krtoaster/app.log"));
    }
}
