//! 설정 파일 로드/저장 (JSON) 및 필드별 변경 구독

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// 팝업을 띄울 모니터 선택 방식
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorConf {
    /// 항상 주 모니터
    Primary,
    /// 마우스 커서가 있는 모니터
    Cursor,
    /// 활성 윈도우가 있는 모니터
    Focused,
}

impl MonitorConf {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorConf::Primary => "PRIMARY",
            MonitorConf::Cursor => "CURSOR",
            MonitorConf::Focused => "FOCUSED",
        }
    }
}

/// 설정 필드 이름
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FadeDuration,
    WindowLifetime,
    WindowSizeRatio,
    MonitorConf,
    InitialAlpha,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::FadeDuration,
        Field::WindowLifetime,
        Field::WindowSizeRatio,
        Field::MonitorConf,
        Field::InitialAlpha,
    ];

    /// JSON 키와 동일한 필드 이름
    pub fn name(&self) -> &'static str {
        match self {
            Field::FadeDuration => "fade_duration",
            Field::WindowLifetime => "window_lifetime",
            Field::WindowSizeRatio => "window_size_ratio",
            Field::MonitorConf => "monitor_conf",
            Field::InitialAlpha => "initial_alpha",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// 값의 종류와 범위 검사
    fn validate(self, value: &Value) -> Result<(), ConfigError> {
        match (self, value) {
            (Field::MonitorConf, Value::Monitor(_)) => Ok(()),
            (Field::MonitorConf, Value::Number(_)) | (_, Value::Monitor(_)) => {
                Err(ConfigError::TypeMismatch(self))
            }
            (field, Value::Number(n)) => {
                let ok = match field {
                    Field::FadeDuration | Field::WindowLifetime => n.is_finite() && *n >= 0.0,
                    Field::WindowSizeRatio => n.is_finite() && *n > 0.0 && *n <= 1.0,
                    Field::InitialAlpha => n.is_finite() && (0.0..=1.0).contains(n),
                    Field::MonitorConf => false,
                };
                if ok {
                    Ok(())
                } else {
                    Err(ConfigError::OutOfRange(field, *n))
                }
            }
        }
    }

    /// JSON 값 하나를 이 필드의 값으로 해석 (실패 시 None)
    fn parse_json(self, json: &Json) -> Option<Value> {
        let value = match self {
            Field::MonitorConf => {
                Value::Monitor(serde_json::from_value::<MonitorConf>(json.clone()).ok()?)
            }
            _ => Value::Number(json.as_f64()?),
        };
        self.validate(&value).ok().map(|_| value)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 설정 값 (숫자 또는 모니터 선택)
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Monitor(MonitorConf),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Monitor(_) => None,
        }
    }

    pub fn as_monitor(&self) -> Option<MonitorConf> {
        match self {
            Value::Monitor(m) => Some(*m),
            Value::Number(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Monitor(m) => f.write_str(m.as_str()),
        }
    }
}

/// 설정 관련 오류
#[derive(Debug)]
pub enum ConfigError {
    UnknownField(String),
    TypeMismatch(Field),
    OutOfRange(Field, f64),
    Io(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownField(name) => write!(f, "알 수 없는 설정 필드: {}", name),
            ConfigError::TypeMismatch(field) => write!(f, "{} 값의 타입이 맞지 않습니다", field),
            ConfigError::OutOfRange(field, n) => {
                write!(f, "{} 값이 허용 범위를 벗어났습니다: {}", field, n)
            }
            ConfigError::Io(e) => write!(f, "설정 파일 입출력 실패: {}", e),
            ConfigError::Parse(e) => write!(f, "설정 파일 파싱 실패: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// 설정 값 묶음
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// 불투명 → 투명까지 걸리는 시간 (초)
    pub fade_duration: f64,
    /// 사라지기 시작하기 전까지 완전히 보이는 시간 (초)
    pub window_lifetime: f64,
    /// 모니터 크기 대비 팝업 크기 비율
    pub window_size_ratio: f64,
    pub monitor_conf: MonitorConf,
    /// 팝업이 나타날 때의 투명도
    pub initial_alpha: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fade_duration: 0.5,
            window_lifetime: 0.5,
            window_size_ratio: 1.0 / 8.0,
            monitor_conf: MonitorConf::Primary,
            initial_alpha: 1.0,
        }
    }
}

impl Config {
    pub fn get(&self, field: Field) -> Value {
        match field {
            Field::FadeDuration => Value::Number(self.fade_duration),
            Field::WindowLifetime => Value::Number(self.window_lifetime),
            Field::WindowSizeRatio => Value::Number(self.window_size_ratio),
            Field::MonitorConf => Value::Monitor(self.monitor_conf),
            Field::InitialAlpha => Value::Number(self.initial_alpha),
        }
    }

    /// 검증을 통과한 값만 반영
    fn apply(&mut self, field: Field, value: Value) -> Result<(), ConfigError> {
        field.validate(&value)?;
        match (field, value) {
            (Field::FadeDuration, Value::Number(n)) => self.fade_duration = n,
            (Field::WindowLifetime, Value::Number(n)) => self.window_lifetime = n,
            (Field::WindowSizeRatio, Value::Number(n)) => self.window_size_ratio = n,
            (Field::MonitorConf, Value::Monitor(m)) => self.monitor_conf = m,
            (Field::InitialAlpha, Value::Number(n)) => self.initial_alpha = n,
            _ => return Err(ConfigError::TypeMismatch(field)),
        }
        Ok(())
    }

    /// JSON 객체에서 필드별로 읽음. 없거나 잘못된 키는 기본값을 쓰고, 모르는 키는 무시
    pub fn from_json_map(map: &Map<String, Json>) -> Config {
        let mut config = Config::default();
        for field in Field::ALL {
            let Some(raw) = map.get(field.name()) else {
                log::info!("설정 키 없음, 기본값 사용: {}", field);
                continue;
            };
            match field.parse_json(raw) {
                Some(value) => {
                    // parse_json에서 이미 검증됨
                    let _ = config.apply(field, value);
                }
                None => log::warn!("잘못된 설정 값, 기본값 사용: {} = {}", field, raw),
            }
        }
        config
    }
}

/// 설정 파일 경로: ~/Library/Application Support/krtoaster/config.json
pub fn config_path() -> PathBuf {
    app_support_dir().join("config.json")
}

/// 앱 데이터 디렉토리
pub fn app_support_dir() -> PathBuf {
    home_dir()
        .join("Library")
        .join("Application Support")
        .join("krtoaster")
}

pub(crate) fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.is_absolute() && p.is_dir())
        // HOME 미설정이거나 유효하지 않으면 /var/tmp 폴백
        .unwrap_or_else(|| PathBuf::from("/var/tmp"))
}

/// 설정 파일 읽기
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let json: Json = serde_json::from_str(&content)?;
    match json {
        Json::Object(map) => Ok(Config::from_json_map(&map)),
        other => Err(ConfigError::Parse(serde::de::Error::custom(format!(
            "JSON 객체가 아닙니다: {}",
            other
        )))),
    }
}

/// 설정 파일 저장 (임시 파일에 쓴 뒤 rename)
pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// 설정 파일 로드. 파일이 없으면 기본값을 쓰고 다시 읽고, 깨져 있으면 기본값으로 재생성
pub fn load_config(path: &Path) -> Config {
    match read_config(path) {
        Ok(config) => config,
        Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("설정 파일 없음, 기본값 생성: {}", path.display());
            regenerate(path)
        }
        Err(e) => {
            log::warn!("설정 파일 로드 실패 ({}), 기본값으로 재생성", e);
            regenerate(path)
        }
    }
}

fn regenerate(path: &Path) -> Config {
    if let Err(e) = save_config(path, &Config::default()) {
        log::error!("기본 설정 저장 실패: {}", e);
        return Config::default();
    }
    read_config(path).unwrap_or_else(|e| {
        log::error!("기본 설정 재로드 실패: {}", e);
        Config::default()
    })
}

/// 구독 식별자. 필드와 프로세스 전역 순번을 담음
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    field: Field,
    seq: u64,
}

impl SubscriptionId {
    pub fn field(&self) -> Field {
        self.field
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.field, self.seq)
    }
}

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(0);

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// 영속화와 변경 알림을 함께 처리하는 설정 저장소
pub struct ConfigStore {
    path: PathBuf,
    state: Mutex<Config>,
    listeners: Mutex<HashMap<Field, Vec<(SubscriptionId, Listener)>>>,
}

impl ConfigStore {
    /// 경로의 설정을 읽어 저장소 생성
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = load_config(&path);
        log::info!("설정 로드됨: {:?}", config);
        Self {
            path,
            state: Mutex::new(config),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Config {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, field: Field) -> Value {
        self.snapshot().get(field)
    }

    pub fn fade_duration(&self) -> f64 {
        self.snapshot().fade_duration
    }

    pub fn window_lifetime(&self) -> f64 {
        self.snapshot().window_lifetime
    }

    pub fn window_size_ratio(&self) -> f64 {
        self.snapshot().window_size_ratio
    }

    pub fn monitor_conf(&self) -> MonitorConf {
        self.snapshot().monitor_conf
    }

    pub fn initial_alpha(&self) -> f64 {
        self.snapshot().initial_alpha
    }

    /// 값을 검증하고 저장한 뒤 파일에 기록하고, 구독자에게 순서대로 알림.
    /// 파일 기록 실패는 로그만 남기고 메모리 값은 유지
    ///
    /// 알림은 잠금을 푼 뒤 호출한 스레드에서 실행된다. 콜백 안에서 get/set을 불러도 되지만,
    /// 여러 스레드가 같은 필드를 동시에 set하면 알림 순서가 저장 순서와 다를 수 있다.
    /// 콜백이 받은 값보다 최신 값이 필요하면 `snapshot()`을 다시 읽을 것.
    pub fn set(&self, field: Field, value: Value) -> Result<(), ConfigError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let mut next = *state;
            next.apply(field, value)?;
            *state = next;
            // 파일 기록이 끝난 뒤에야 잠금이 풀림
            if let Err(e) = save_config(&self.path, &state) {
                log::error!("설정 저장 실패 ({} = {}): {}", field, value, e);
            }
        }
        log::info!("설정 변경: {} = {}", field, value);
        self.notify(field, &value);
        Ok(())
    }

    /// 필드 이름 문자열로 설정
    pub fn set_by_name(&self, name: &str, value: Value) -> Result<(), ConfigError> {
        let field = Field::from_name(name).ok_or_else(|| ConfigError::UnknownField(name.to_string()))?;
        self.set(field, value)
    }

    /// 디스크에서 다시 읽어 값이 바뀐 필드의 구독자에게 알림.
    /// 읽기와 교체를 한 잠금 안에서 하므로 그 사이에 끼어든 set이 되돌려지지 않음
    pub fn reload(&self) {
        let (previous, loaded) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let loaded = load_config(&self.path);
            (std::mem::replace(&mut *state, loaded), loaded)
        };
        log::info!("설정 다시 불러옴: {:?}", loaded);
        for field in Field::ALL {
            let value = loaded.get(field);
            if previous.get(field) != value {
                self.notify(field, &value);
            }
        }
    }

    /// 필드 변경 구독
    pub fn listen<F>(&self, field: Field, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = SubscriptionId {
            field,
            seq: NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed),
        };
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners
            .entry(field)
            .or_default()
            .push((id, Arc::new(callback)));
        log::debug!("구독 등록: {}", id);
        id
    }

    /// 구독 해제 (이미 해제된 경우 무시)
    pub fn forget(&self, id: SubscriptionId) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = listeners.get_mut(&id.field) {
            list.retain(|(sid, _)| *sid != id);
        }
    }

    fn notify(&self, field: Field, value: &Value) {
        // 콜백 안에서 get/listen/forget을 호출할 수 있도록 잠금 밖에서 실행
        let callbacks: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners
                .get(&field)
                .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };
        for callback in callbacks {
            callback(value);
        }
    }
}
