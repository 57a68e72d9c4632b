//! CEL 표현식 래퍼
//!
//! 선언 스키마(YAML)의 검증 규칙, virtual getter, 계산 기본값은 CEL 표현식으로 작성됩니다.
//! 정의 시점에 한 번 컴파일해 문법을 확인하고, 평가 시마다 새 컨텍스트로 실행합니다.

use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::objects::{Key, Map as CelMap, Value as CelValue};
use cel_interpreter::{Context, Program};
use serde_json::Value;

/// 컴파일 검증을 통과한 CEL 표현식
#[derive(Debug, Clone)]
pub struct CelExpr {
    source: String,
}

impl CelExpr {
    /// 표현식 컴파일 (문법 검증)
    pub fn compile(source: &str) -> Result<Self, String> {
        Program::compile(source).map_err(|e| e.to_string())?;
        Ok(Self {
            source: source.to_string(),
        })
    }

    /// 변수 바인딩 후 평가
    pub fn eval<I>(&self, vars: I) -> Result<Value, String>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut ctx = Context::default();
        for (name, value) in vars {
            ctx.add_variable_from_value(name, json_to_cel(value));
        }

        let program = Program::compile(&self.source).map_err(|e| e.to_string())?;
        let result = program.execute(&ctx).map_err(|e| e.to_string())?;
        Ok(cel_to_json(result))
    }

    /// bool 결과로 평가
    pub fn eval_bool<I>(&self, vars: I) -> Result<bool, String>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        match self.eval(vars)? {
            Value::Bool(b) => Ok(b),
            other => Err(format!("expression did not evaluate to bool: {}", other)),
        }
    }
}

fn json_to_cel(value: Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                CelValue::UInt(u)
            } else if let Some(f) = n.as_f64() {
                CelValue::Float(f)
            } else {
                CelValue::Null
            }
        }
        Value::String(s) => CelValue::String(s.into()),
        Value::Array(arr) => {
            let values = arr.into_iter().map(json_to_cel).collect::<Vec<_>>();
            CelValue::List(Arc::new(values))
        }
        Value::Object(map) => {
            let mut obj = HashMap::new();
            for (k, v) in map {
                obj.insert(Key::from(k), json_to_cel(v));
            }
            CelValue::Map(CelMap { map: Arc::new(obj) })
        }
    }
}

fn cel_to_json(value: CelValue) -> Value {
    match value {
        CelValue::Null => Value::Null,
        CelValue::Bool(b) => Value::Bool(b),
        CelValue::Int(i) => Value::from(i),
        CelValue::UInt(u) => Value::from(u),
        CelValue::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CelValue::String(s) => Value::String(s.to_string()),
        CelValue::List(items) => Value::Array(items.iter().cloned().map(cel_to_json).collect()),
        CelValue::Map(m) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in m.map.iter() {
                #[allow(unreachable_patterns)]
                let key = match k {
                    Key::String(s) => s.to_string(),
                    Key::Int(i) => i.to_string(),
                    Key::Uint(u) => u.to_string(),
                    Key::Bool(b) => b.to_string(),
                    _ => continue,
                };
                obj.insert(key, cel_to_json(v.clone()));
            }
            Value::Object(obj)
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_rejects_bad_syntax() {
        assert!(CelExpr::compile("value > ").is_err());
        assert!(CelExpr::compile("value > 0").is_ok());
    }

    #[test]
    fn test_eval_bool() {
        let expr = CelExpr::compile("value > 0").unwrap();
        assert_eq!(expr.eval_bool([("value".to_string(), json!(3))]), Ok(true));
        assert_eq!(expr.eval_bool([("value".to_string(), json!(-15))]), Ok(false));
    }

    #[test]
    fn test_eval_string_concat() {
        let expr = CelExpr::compile("name + ' ' + surname").unwrap();
        let result = expr
            .eval([
                ("name".to_string(), json!("Alex")),
                ("surname".to_string(), json!("Rubiks")),
            ])
            .unwrap();
        assert_eq!(result, json!("Alex Rubiks"));
    }

    #[test]
    fn test_non_bool_result_is_error() {
        let expr = CelExpr::compile("1 + 1").unwrap();
        assert!(expr.eval_bool(Vec::<(String, Value)>::new()).is_err());
    }
}
