//! Presentation helpers: pure functions from view state to display text

use crate::machine::ViewState;
use crate::normalize::{AnalysisResult, LashLengths};
use reqwest::Url;

/// Shown for every field the service did not provide
pub const UNKNOWN: &str = "unknown";

/// Resolve an output image path against the analysis endpoint's origin.
///
/// The endpoint's route is stripped before joining, so
/// `http://host:8000/analyze_lash/` + `out.jpg` gives `http://host:8000/out.jpg`.
/// Absolute URLs are returned unchanged.
pub fn resolve_output_image_url(endpoint: &Url, path: &str) -> Option<Url> {
    let mut origin = endpoint.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin.join(path.trim()).ok()
}

fn or_unknown<T>(value: Option<T>, render: impl FnOnce(T) -> String) -> String {
    value.map(render).unwrap_or_else(|| UNKNOWN.to_string())
}

fn millimetres(value: f64) -> String {
    format!("{value} mm")
}

fn yes_no(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => UNKNOWN,
    }
}

fn lengths(value: &LashLengths) -> String {
    match value {
        LashLengths::Range(range) => range.clone(),
        LashLengths::Millimetres(values) => {
            let joined: Vec<String> = values.iter().map(f64::to_string).collect();
            format!("{} mm", joined.join(", "))
        }
    }
}

/// Labelled rows for a result, in display order.
///
/// Every field gets a row; absent fields read "unknown".
pub fn result_rows(result: &AnalysisResult, endpoint: &Url) -> Vec<(&'static str, String)> {
    let fit = &result.lash_fit_length_mm;
    let output_image = result.output_image_url.as_deref().map(|path| {
        resolve_output_image_url(endpoint, path)
            .map(|url| url.to_string())
            .unwrap_or_else(|| path.to_string())
    });

    vec![
        ("Eye shape", or_unknown(result.eye_shape.clone(), |s| s)),
        ("Ratio", or_unknown(result.ratio, |r| r.to_string())),
        ("Left lash fit", or_unknown(fit.left_eye, millimetres)),
        ("Right lash fit", or_unknown(fit.right_eye, millimetres)),
        ("Style", or_unknown(result.recommended_style.clone(), |s| s)),
        ("Curl", or_unknown(result.recommended_curl.clone(), |s| s)),
        ("Lengths", or_unknown(result.recommended_lengths_mm.as_ref(), lengths)),
        (
            "Hooded eyes",
            format!(
                "left {}, right {}",
                yes_no(result.hooded_eye.left),
                yes_no(result.hooded_eye.right)
            ),
        ),
        ("Description", or_unknown(result.description.clone(), |s| s)),
        ("Notes", or_unknown(result.notes.clone(), |s| s)),
        ("IPD scale", or_unknown(result.ipd_scale_mm, millimetres)),
        ("Output image", or_unknown(output_image, |s| s)),
    ]
}

/// One-line description of the current state
pub fn status_line(state: &ViewState) -> String {
    match state {
        ViewState::Idle => "Choose a photo to analyze".to_string(),
        ViewState::Ready(file) => format!("Ready to analyze {} ({} bytes)", file.name(), file.size()),
        ViewState::Analyzing(file) => format!("Analyzing {}...", file.name()),
        ViewState::Success(_) => "Analysis complete".to_string(),
        ViewState::Failed(error) => format!("Analysis failed: {error}"),
    }
}
