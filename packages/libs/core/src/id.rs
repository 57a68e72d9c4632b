//! ID 생성 유틸리티
//!
//! 스키마의 `$generate` 기본값과 호출자가 직접 사용하는 UUID를 생성합니다.
//!
//! # 지원되는 전략
//!
//! - `uuid`: UUID v4 (랜덤)
//! - `timeuuid`: UUID v1 (시간순 정렬 가능, CQL `timeuuid` 컬럼용)
//! - `now`: 현재 시각 (RFC 3339, 밀리초)

use std::sync::OnceLock;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 프로세스 내 값 생성 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// UUID v4 - 완전 랜덤
    Uuid,

    /// UUID v1 - 시간 기반, 정렬 가능
    Timeuuid,

    /// 현재 시각 (timestamp 컬럼용)
    Now,
}

impl IdStrategy {
    /// 문자열에서 파싱
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uuid" | "uuid_v4" => Some(IdStrategy::Uuid),
            "timeuuid" | "uuid_v1" => Some(IdStrategy::Timeuuid),
            "now" => Some(IdStrategy::Now),
            _ => None,
        }
    }

    /// 이 전략이 생성하는 값에 맞는 기본 타입
    pub fn default_type(&self) -> &'static str {
        match self {
            IdStrategy::Uuid => "uuid",
            IdStrategy::Timeuuid => "timeuuid",
            IdStrategy::Now => "timestamp",
        }
    }
}

/// ID 생성기
pub struct IdGenerator;

impl IdGenerator {
    /// 랜덤 UUID (v4)
    pub fn new_random_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// 시간순 UUID (v1, timeuuid)
    pub fn new_time_ordered_id() -> String {
        uuid::Uuid::now_v1(node_id()).to_string()
    }

    /// 전략에 따라 JSON 값 생성
    pub fn generate(strategy: IdStrategy) -> Value {
        match strategy {
            IdStrategy::Uuid => Value::String(Self::new_random_id()),
            IdStrategy::Timeuuid => Value::String(Self::new_time_ordered_id()),
            IdStrategy::Now => {
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

/// timeuuid 노드 ID (프로세스당 한 번 랜덤 생성)
fn node_id() -> &'static [u8; 6] {
    static NODE_ID: OnceLock<[u8; 6]> = OnceLock::new();
    NODE_ID.get_or_init(|| {
        let mut node = rand::random::<[u8; 6]>();
        // multicast 비트: 실제 MAC 주소와 구분
        node[0] |= 0x01;
        node
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_id_generation() {
        let id1 = IdGenerator::new_random_id();
        let id2 = IdGenerator::new_random_id();

        assert_eq!(id1.len(), 36); // UUID with hyphens
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_time_ordered_id_is_v1() {
        let id = IdGenerator::new_time_ordered_id();
        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 1);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(IdStrategy::from_str("uuid"), Some(IdStrategy::Uuid));
        assert_eq!(IdStrategy::from_str("timeuuid"), Some(IdStrategy::Timeuuid));
        assert_eq!(IdStrategy::from_str("now"), Some(IdStrategy::Now));
        assert_eq!(IdStrategy::from_str("ulid"), None);
    }

    #[test]
    fn test_generate_now_is_rfc3339() {
        let value = IdGenerator::generate(IdStrategy::Now);
        let text = value.as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok());
        assert!(text.ends_with('Z'));
    }
}
