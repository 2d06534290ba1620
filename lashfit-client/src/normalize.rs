//! Response normalization
//!
//! The analysis service has answered in several shapes over time: flat
//! top-level fields, `analysis` / `recommendation` sub-objects, a `result`
//! envelope, or an `error` / `detail` diagnostic instead of a payload. Every
//! canonical field is probed independently: its key names are looked up under
//! `analysis`, then `recommendation`, then `result`, then at the top level.
//! The first location holding a value of the expected type wins; a
//! wrong-typed value counts as absent.
//!
//! Supporting a new spelling of a field means adding a key to the tables below.

use crate::client::{AnalysisError, RawResponseBody};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

type JsonPath = &'static [&'static str];

/// Sub-objects probed before the top level, in precedence order
const SCOPES: &[&str] = &["analysis", "recommendation", "result"];

const EYE_SHAPE: &[JsonPath] = &[&["eye_shape"]];

const RATIO: &[JsonPath] = &[&["ratio"]];

const LASH_FIT_LEFT: &[JsonPath] = &[&["lash_fit_length_mm", "left_eye"]];

const LASH_FIT_RIGHT: &[JsonPath] = &[&["lash_fit_length_mm", "right_eye"]];

const RECOMMENDED_STYLE: &[JsonPath] = &[&["recommended_style"], &["predicted_lash_style"]];

const RECOMMENDED_CURL: &[JsonPath] = &[&["recommended_curl"]];

const RECOMMENDED_LENGTHS: &[JsonPath] = &[&["recommended_lengths_mm"]];

// `reasoning` is an older spelling of the same text
const DESCRIPTION: &[JsonPath] = &[&["description"], &["reasoning"]];

const HOODED_LEFT: &[JsonPath] = &[&["hooded_eye", "left"]];

const HOODED_RIGHT: &[JsonPath] = &[&["hooded_eye", "right"]];

const OUTPUT_IMAGE: &[JsonPath] = &[&["output_image_url"], &["output_image"]];

const NOTES: &[JsonPath] = &[&["notes"]];

const IPD_SCALE: &[JsonPath] = &[&["scale_based_on_IPD_mm"], &["scale"]];

/// Fitted lash length per eye, in millimetres
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LashFit {
    pub left_eye: Option<f64>,
    pub right_eye: Option<f64>,
}

/// Hooded eye detection per eye
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HoodedEye {
    pub left: Option<bool>,
    pub right: Option<bool>,
}

/// Recommended lash lengths: either a range label ("9–12 mm") or explicit values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LashLengths {
    Range(String),
    Millimetres(Vec<f64>),
}

/// Canonical analysis result, independent of the wire shape that produced it
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub eye_shape: Option<String>,
    pub ratio: Option<f64>,
    pub lash_fit_length_mm: LashFit,
    pub recommended_style: Option<String>,
    pub recommended_curl: Option<String>,
    pub recommended_lengths_mm: Option<LashLengths>,
    pub description: Option<String>,
    pub hooded_eye: HoodedEye,
    pub output_image_url: Option<String>,
    pub notes: Option<String>,
    pub ipd_scale_mm: Option<f64>,
}

impl AnalysisResult {
    /// Number of fields that were recovered from the response
    pub fn field_count(&self) -> usize {
        [
            self.eye_shape.is_some(),
            self.ratio.is_some(),
            self.lash_fit_length_mm.left_eye.is_some(),
            self.lash_fit_length_mm.right_eye.is_some(),
            self.recommended_style.is_some(),
            self.recommended_curl.is_some(),
            self.recommended_lengths_mm.is_some(),
            self.description.is_some(),
            self.hooded_eye.left.is_some(),
            self.hooded_eye.right.is_some(),
            self.output_image_url.is_some(),
            self.notes.is_some(),
            self.ipd_scale_mm.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }
}

fn lookup<'a>(body: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(body, |value, key| value.get(key))
}

/// Scopes a field is looked up in: each nested sub-object, then the top level
fn scopes(body: &Value) -> impl Iterator<Item = &Value> {
    SCOPES
        .iter()
        .filter_map(move |scope| body.get(*scope))
        .chain(std::iter::once(body))
}

/// First key (in table order) of the first scope holding a value of the expected type
fn probe<T>(body: &Value, keys: &[JsonPath], extract: fn(&Value) -> Option<T>) -> Option<T> {
    scopes(body).find_map(|scope| keys.iter().find_map(|key| lookup(scope, key).and_then(extract)))
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

fn flag(value: &Value) -> Option<bool> {
    value.as_bool()
}

fn lengths(value: &Value) -> Option<LashLengths> {
    match value {
        Value::String(_) => text(value).map(LashLengths::Range),
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(number)
            .collect::<Option<Vec<_>>>()
            .map(LashLengths::Millimetres),
        _ => None,
    }
}

/// Diagnostic message carried by a service error body, if any.
///
/// Recognizes a string `error`, a string `detail`, and the validation
/// envelope where `detail` is a list of `{ "msg": ... }` entries.
pub fn service_error_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("error").and_then(text) {
        return Some(message);
    }

    let detail = body.get("detail")?;
    match detail.as_array() {
        Some(items) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(text))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        None => text(detail),
    }
}

fn extract(body: &Value) -> AnalysisResult {
    AnalysisResult {
        eye_shape: probe(body, EYE_SHAPE, text),
        ratio: probe(body, RATIO, number),
        lash_fit_length_mm: LashFit {
            left_eye: probe(body, LASH_FIT_LEFT, number),
            right_eye: probe(body, LASH_FIT_RIGHT, number),
        },
        recommended_style: probe(body, RECOMMENDED_STYLE, text),
        recommended_curl: probe(body, RECOMMENDED_CURL, text),
        recommended_lengths_mm: probe(body, RECOMMENDED_LENGTHS, lengths),
        // A bare `result` string is the oldest form of the description
        description: probe(body, DESCRIPTION, text).or_else(|| body.get("result").and_then(text)),
        hooded_eye: HoodedEye {
            left: probe(body, HOODED_LEFT, flag),
            right: probe(body, HOODED_RIGHT, flag),
        },
        output_image_url: probe(body, OUTPUT_IMAGE, text),
        notes: probe(body, NOTES, text),
        ipd_scale_mm: probe(body, IPD_SCALE, number),
    }
}

/// Turn a raw response body into the canonical result.
///
/// Fails with `ServiceReported` when the body only carries a diagnostic, and
/// with `MalformedResponse` when nothing at all can be recovered.
pub fn normalize(body: &RawResponseBody) -> Result<AnalysisResult, AnalysisError> {
    if !body.is_object() {
        debug!("Analysis response is not a JSON object");
        return Err(AnalysisError::MalformedResponse);
    }

    let result = extract(body);
    let service_error = service_error_message(body);

    if result.is_empty() {
        return Err(match service_error {
            Some(message) => AnalysisError::ServiceReported(message),
            None => AnalysisError::MalformedResponse,
        });
    }

    if let Some(message) = service_error {
        warn!(error = %message, "Service reported an error alongside a payload; using the payload");
    }
    debug!(fields = result.field_count(), "Normalized analysis response");

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_shape() {
        let body = json!({
            "analysis": {"eye_shape": "almond", "ratio": 2.1},
            "recommendation": {"recommended_style": "wispy"}
        });

        let result = normalize(&body).unwrap();
        assert_eq!(
            result,
            AnalysisResult {
                eye_shape: Some("almond".to_string()),
                ratio: Some(2.1),
                recommended_style: Some("wispy".to_string()),
                ..AnalysisResult::default()
            }
        );
        assert_eq!(result.lash_fit_length_mm, LashFit::default());
    }

    #[test]
    fn test_flat_shape() {
        let body = json!({
            "eye_shape": "round",
            "predicted_lash_style": "dramatic",
            "lash_fit_length_mm": {"left_eye": 9, "right_eye": 9.5}
        });

        let result = normalize(&body).unwrap();
        assert_eq!(result.eye_shape.as_deref(), Some("round"));
        assert_eq!(result.recommended_style.as_deref(), Some("dramatic"));
        assert_eq!(result.lash_fit_length_mm.left_eye, Some(9.0));
        assert_eq!(result.lash_fit_length_mm.right_eye, Some(9.5));
        assert_eq!(result.ratio, None);
    }

    #[test]
    fn test_error_only_is_service_reported() {
        let body = json!({"error": "no face detected"});
        assert_eq!(
            normalize(&body),
            Err(AnalysisError::ServiceReported("no face detected".to_string()))
        );

        let body = json!({"detail": "Image not found"});
        assert_eq!(
            normalize(&body),
            Err(AnalysisError::ServiceReported("Image not found".to_string()))
        );
    }

    #[test]
    fn test_empty_object_is_malformed() {
        assert_eq!(normalize(&json!({})), Err(AnalysisError::MalformedResponse));
    }

    #[test]
    fn test_non_object_is_malformed() {
        for body in [json!([]), json!("almond"), json!(3), json!(null)] {
            assert_eq!(normalize(&body), Err(AnalysisError::MalformedResponse));
        }
    }

    #[test]
    fn test_unknown_vocabulary_is_malformed() {
        let body = json!({"message": "AI-sthetics Backend is Live!"});
        assert_eq!(normalize(&body), Err(AnalysisError::MalformedResponse));
    }

    #[test]
    fn test_shape_invariance() {
        let flat = json!({
            "eye_shape": "Almond Eyes",
            "ratio": 3.2,
            "lash_fit_length_mm": {"left_eye": 10.4, "right_eye": 10.1},
            "recommended_style": "Cat-Eye or Natural Sweep",
            "recommended_curl": "CC or D Curl",
            "description": "Enhances natural symmetry and elongates outer corners."
        });
        let nested = json!({
            "analysis": {
                "eye_shape": "Almond Eyes",
                "ratio": 3.2,
                "lash_fit_length_mm": {"left_eye": 10.4, "right_eye": 10.1}
            },
            "recommendation": {
                "recommended_style": "Cat-Eye or Natural Sweep",
                "recommended_curl": "CC or D Curl",
                "description": "Enhances natural symmetry and elongates outer corners."
            }
        });
        let enveloped = json!({"result": flat.clone()});

        let expected = normalize(&flat).unwrap();
        assert_eq!(normalize(&nested).unwrap(), expected);
        assert_eq!(normalize(&enveloped).unwrap(), expected);
        assert_eq!(expected.field_count(), 7);
    }

    #[test]
    fn test_normalize_is_repeatable() {
        let body = json!({
            "analysis": {"eye_shape": "almond", "hooded_eye": {"left": true, "right": false}},
            "predicted_lash_style": "wispy"
        });
        assert_eq!(normalize(&body), normalize(&body));
    }

    #[test]
    fn test_nested_wins_over_flat() {
        let body = json!({
            "analysis": {"eye_shape": "almond"},
            "eye_shape": "round"
        });
        assert_eq!(normalize(&body).unwrap().eye_shape.as_deref(), Some("almond"));
    }

    /// Every key the normalizer knows, with two distinct values of its type
    fn vocabulary() -> Vec<(JsonPath, Value, Value)> {
        vec![
            (EYE_SHAPE[0], json!("Almond Eyes"), json!("Round Eyes")),
            (RATIO[0], json!(3.2), json!(1.8)),
            (LASH_FIT_LEFT[0], json!(10.4), json!(9.0)),
            (LASH_FIT_RIGHT[0], json!(10.1), json!(9.5)),
            (RECOMMENDED_STYLE[0], json!("Cat-Eye"), json!("Dolly")),
            (RECOMMENDED_STYLE[1], json!("Natural Sweep"), json!("Doll Style")),
            (RECOMMENDED_CURL[0], json!("C Curl"), json!("D Curl")),
            (RECOMMENDED_LENGTHS[0], json!("10–13 mm"), json!("9–12 mm")),
            (DESCRIPTION[0], json!("Elongates corners."), json!("Opens the eye.")),
            (DESCRIPTION[1], json!("Ratio above 3."), json!("Ratio below 2.")),
            (HOODED_LEFT[0], json!(true), json!(false)),
            (HOODED_RIGHT[0], json!(false), json!(true)),
            (OUTPUT_IMAGE[0], json!("/static/a.jpg"), json!("/static/b.jpg")),
            (OUTPUT_IMAGE[1], json!("a.jpg"), json!("b.jpg")),
            (NOTES[0], json!("Deep set"), json!("Shallow set")),
            (IPD_SCALE[0], json!(0.4), json!(0.3)),
            (IPD_SCALE[1], json!(0.37), json!(0.29)),
        ]
    }

    /// Build a body holding `value` at `key`, under `scope` when given
    fn place(scope: Option<&str>, key: JsonPath, value: Value) -> Value {
        let wrap = |name: &str, inner: Value| {
            Value::Object(serde_json::Map::from_iter([(name.to_string(), inner)]))
        };
        let field = key.iter().rev().fold(value, |inner, name| wrap(*name, inner));
        match scope {
            Some(scope) => wrap(scope, field),
            None => field,
        }
    }

    #[test]
    fn test_every_key_is_found_in_every_scope() {
        for (key, value, _) in vocabulary() {
            let flat = normalize(&place(None, key, value.clone()))
                .unwrap_or_else(|e| panic!("{key:?} at top level: {e}"));
            assert_eq!(flat.field_count(), 1, "{key:?} at top level");

            for &scope in SCOPES {
                let nested = normalize(&place(Some(scope), key, value.clone()))
                    .unwrap_or_else(|e| panic!("{key:?} under {scope}: {e}"));
                assert_eq!(nested, flat, "{key:?} under {scope}");
            }
        }
    }

    #[test]
    fn test_every_key_prefers_nested_over_flat() {
        for (key, nested_value, flat_value) in vocabulary() {
            let expected = normalize(&place(None, key, nested_value.clone())).unwrap();

            for &scope in SCOPES {
                let mut body = place(Some(scope), key, nested_value.clone());
                let flat = place(None, key, flat_value.clone());
                body.as_object_mut()
                    .unwrap()
                    .extend(flat.as_object().unwrap().clone());

                assert_eq!(normalize(&body).unwrap(), expected, "{key:?} under {scope}");
            }
        }
    }

    #[test]
    fn test_scopes_probe_in_order() {
        let body = json!({
            "result": {"recommended_curl": "B Curl"},
            "recommendation": {"recommended_curl": "C Curl"},
            "analysis": {"recommended_curl": "D Curl"}
        });
        assert_eq!(normalize(&body).unwrap().recommended_curl.as_deref(), Some("D Curl"));

        let body = json!({
            "result": {"ratio": 2.0},
            "recommendation": {"ratio": 3.0}
        });
        assert_eq!(normalize(&body).unwrap().ratio, Some(3.0));
    }

    #[test]
    fn test_wrong_type_falls_through() {
        let body = json!({
            "analysis": {"ratio": "2.4", "eye_shape": 7},
            "ratio": 2.4,
            "eye_shape": "round"
        });

        let result = normalize(&body).unwrap();
        assert_eq!(result.ratio, Some(2.4));
        assert_eq!(result.eye_shape.as_deref(), Some("round"));
    }

    #[test]
    fn test_missing_ratio_is_not_zero() {
        let result = normalize(&json!({"eye_shape": "round"})).unwrap();
        assert_eq!(result.ratio, None);
        assert_eq!(result.field_count(), 1);
    }

    #[test]
    fn test_lash_fit_sides_probe_independently() {
        let body = json!({
            "analysis": {"lash_fit_length_mm": {"left_eye": 10.2}},
            "lash_fit_length_mm": {"left_eye": 1.0, "right_eye": 9.8}
        });

        let fit = normalize(&body).unwrap().lash_fit_length_mm;
        assert_eq!(fit.left_eye, Some(10.2));
        assert_eq!(fit.right_eye, Some(9.8));
    }

    #[test]
    fn test_error_with_payload_uses_payload() {
        let body = json!({"error": "low confidence", "eye_shape": "round"});
        let result = normalize(&body).unwrap();
        assert_eq!(result.eye_shape.as_deref(), Some("round"));
    }

    #[test]
    fn test_validation_envelope_message() {
        let body = json!({"detail": [
            {"loc": ["body", "file"], "msg": "Field required"},
            {"loc": ["body"], "msg": "Expected UploadFile"}
        ]});
        assert_eq!(
            normalize(&body),
            Err(AnalysisError::ServiceReported(
                "Field required; Expected UploadFile".to_string()
            ))
        );
    }

    #[test]
    fn test_blank_strings_are_absent() {
        let body = json!({"eye_shape": "   ", "error": ""});
        assert_eq!(normalize(&body), Err(AnalysisError::MalformedResponse));
    }

    #[test]
    fn test_recommended_lengths() {
        let range = normalize(&json!({"recommendation": {"recommended_lengths_mm": "9–12 mm"}}))
            .unwrap()
            .recommended_lengths_mm;
        assert_eq!(range, Some(LashLengths::Range("9–12 mm".to_string())));

        let values = normalize(&json!({"recommended_lengths_mm": [9, 10.5, 12]}))
            .unwrap()
            .recommended_lengths_mm;
        assert_eq!(values, Some(LashLengths::Millimetres(vec![9.0, 10.5, 12.0])));

        // A mixed list is the wrong type, so the field is absent
        let mixed = normalize(&json!({"recommended_lengths_mm": [9, "ten"], "eye_shape": "round"}))
            .unwrap()
            .recommended_lengths_mm;
        assert_eq!(mixed, None);
    }

    #[test]
    fn test_single_image_service_shape() {
        let body = json!({
            "eye_shape": "Balanced Eyes",
            "ratio": 2.57,
            "recommended_style": "Classic or Hybrid Lash (Hooded eyes: emphasize outer corner, use curled lashes)",
            "reasoning": "Balanced eyes work well with classic or hybrid lashes.",
            "hooded_eye": {"left": true, "right": false},
            "lash_fit_length_mm": {"left_eye": 10.3, "right_eye": 10.6},
            "scale_based_on_IPD_mm": 0.4,
            "output_image": "output_lash_hooded.jpg"
        });

        let result = normalize(&body).unwrap();
        assert_eq!(result.description.as_deref(), Some("Balanced eyes work well with classic or hybrid lashes."));
        assert_eq!(result.hooded_eye, HoodedEye { left: Some(true), right: Some(false) });
        assert_eq!(result.output_image_url.as_deref(), Some("output_lash_hooded.jpg"));
        assert_eq!(result.ipd_scale_mm, Some(0.4));
        assert_eq!(result.recommended_curl, None);
    }

    #[test]
    fn test_recommendation_plan_shape() {
        let body = json!({
            "analysis": {"eye_shape": "Round Eyes", "ratio": 1.8, "scale": 0.37},
            "recommendation": {
                "eye_shape": "Round Eyes",
                "recommended_style": "Dolly or Open-Eye (Soft even mapping)",
                "description": "Opens up and balances the roundness with upward length.",
                "recommended_curl": "CC or D Curl",
                "recommended_lengths_mm": "9–12 mm",
                "notes": "Average Depth, Moderate lid exposure, Balanced alignment"
            }
        });

        let result = normalize(&body).unwrap();
        assert_eq!(result.recommended_curl.as_deref(), Some("CC or D Curl"));
        assert_eq!(
            result.notes.as_deref(),
            Some("Average Depth, Moderate lid exposure, Balanced alignment")
        );
        assert_eq!(result.ipd_scale_mm, Some(0.37));
        assert_eq!(result.field_count(), 8);
    }

    #[test]
    fn test_generic_result_string() {
        let body = json!({"result": "Almond eyes suit a cat-eye map."});
        let result = normalize(&body).unwrap();
        assert_eq!(result.description.as_deref(), Some("Almond eyes suit a cat-eye map."));
        assert_eq!(result.field_count(), 1);
    }
}
