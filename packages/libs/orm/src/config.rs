//! bind 설정

use std::collections::BTreeMap;
use std::env;

use serde::{Deserialize, Serialize};

use clb_core::{Error, Result};

/// consistency level (드라이버로 그대로 전달)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    #[default]
    LocalOne,
}

impl Consistency {
    /// 문자열에서 파싱 (대소문자 무시)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Some(Consistency::Any),
            "one" => Some(Consistency::One),
            "two" => Some(Consistency::Two),
            "three" => Some(Consistency::Three),
            "quorum" => Some(Consistency::Quorum),
            "all" => Some(Consistency::All),
            "local_quorum" => Some(Consistency::LocalQuorum),
            "each_quorum" => Some(Consistency::EachQuorum),
            "serial" => Some(Consistency::Serial),
            "local_serial" => Some(Consistency::LocalSerial),
            "local_one" => Some(Consistency::LocalOne),
            _ => None,
        }
    }
}

/// bind 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindOptions {
    /// 클러스터 접속 지점 (드라이버가 사용)
    #[serde(default = "default_contact_points")]
    pub contact_points: Vec<String>,

    /// 대상 keyspace
    pub keyspace: String,

    /// 기본 consistency level
    #[serde(default)]
    pub consistency: Consistency,

    /// keyspace 생성 시에만 쓰이는 복제 설정
    #[serde(default = "default_replication")]
    pub replication_strategy: BTreeMap<String, String>,

    /// bind 시 `CREATE KEYSPACE IF NOT EXISTS` 실행 여부
    #[serde(default = "default_true")]
    pub create_keyspace: bool,

    /// 호환되지 않는 스키마 차이가 있을 때 테이블을 삭제 후 재생성
    #[serde(default)]
    pub destructive_recreate_on_schema_change: bool,
}

fn default_contact_points() -> Vec<String> {
    vec!["127.0.0.1:9042".to_string()]
}

fn default_replication() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("class".to_string(), "SimpleStrategy".to_string()),
        ("replication_factor".to_string(), "1".to_string()),
    ])
}

fn default_true() -> bool {
    true
}

impl BindOptions {
    pub fn new(keyspace: impl Into<String>) -> Self {
        Self {
            contact_points: default_contact_points(),
            keyspace: keyspace.into(),
            consistency: Consistency::default(),
            replication_strategy: default_replication(),
            create_keyspace: true,
            destructive_recreate_on_schema_change: false,
        }
    }

    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn destructive_recreate(mut self, enabled: bool) -> Self {
        self.destructive_recreate_on_schema_change = enabled;
        self
    }

    pub fn create_keyspace(mut self, enabled: bool) -> Self {
        self.create_keyspace = enabled;
        self
    }

    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// 임의의 변수 조회 함수로 설정 로드
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let contact_points = get("CLB_CONTACT_POINTS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|points| !points.is_empty())
            .unwrap_or_else(default_contact_points);

        let keyspace = get("CLB_KEYSPACE").unwrap_or_else(|| "columba".to_string());

        let consistency = match get("CLB_CONSISTENCY") {
            Some(v) => Consistency::from_str(&v).ok_or_else(|| Error::Config {
                message: format!("unknown consistency level '{}'", v),
            })?,
            None => Consistency::default(),
        };

        let replication_strategy = match get("CLB_REPLICATION") {
            Some(v) => parse_replication(&v)?,
            None => default_replication(),
        };

        Ok(Self {
            contact_points,
            keyspace,
            consistency,
            replication_strategy,
            create_keyspace: parse_bool(get("CLB_CREATE_KEYSPACE"), "CLB_CREATE_KEYSPACE", true)?,
            destructive_recreate_on_schema_change: parse_bool(
                get("CLB_DESTRUCTIVE_RECREATE"),
                "CLB_DESTRUCTIVE_RECREATE",
                false,
            )?,
        })
    }
}

/// `class=SimpleStrategy,replication_factor=1` 형식
fn parse_replication(value: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (k, v) = pair.split_once('=').ok_or_else(|| Error::Config {
            message: format!("invalid replication option '{}', expected key=value", pair),
        })?;
        map.insert(k.trim().to_string(), v.trim().to_string());
    }
    if !map.contains_key("class") {
        return Err(Error::Config {
            message: "replication options must include 'class'".to_string(),
        });
    }
    Ok(map)
}

fn parse_bool(value: Option<String>, name: &str, default: bool) -> Result<bool> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| Error::Config {
            message: format!("{} must be true or false, got '{}'", name, v),
        }),
    }
}
