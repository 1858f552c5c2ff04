//! Image transformation vocabulary
//!
//! Presets are lists of steps; each step is a JSON object such as
//! `{"width": 200, "crop": "scale"}`. A preset renders to the URL path
//! segment understood by Cloudinary-compatible delivery services:
//! `c_scale,w_200/r_max`.

use crate::{PhotoShareError, PresetStep, Result};
use serde_json::Value;

/// Known step parameters and their URL short codes
const PARAMETERS: &[(&str, &str)] = &[
    ("angle", "a"),
    ("aspect_ratio", "ar"),
    ("background", "b"),
    ("border", "bo"),
    ("color", "co"),
    ("crop", "c"),
    ("dpr", "dpr"),
    ("effect", "e"),
    ("fetch_format", "f"),
    ("gravity", "g"),
    ("height", "h"),
    ("opacity", "o"),
    ("quality", "q"),
    ("radius", "r"),
    ("width", "w"),
    ("x", "x"),
    ("y", "y"),
    ("zoom", "z"),
];

/// Short code for a step parameter
pub fn short_code(parameter: &str) -> Option<&'static str> {
    PARAMETERS
        .iter()
        .find(|(name, _)| *name == parameter)
        .map(|(_, code)| *code)
}

/// Check a preset without rendering it
pub fn validate_preset(preset: &[PresetStep]) -> Result<()> {
    build_transformation(preset).map(|_| ())
}

/// Render a preset into a URL path segment
pub fn build_transformation(preset: &[PresetStep]) -> Result<String> {
    if preset.is_empty() {
        return Err(PhotoShareError::ValidationError(
            "transformation preset is empty".to_string(),
        ));
    }

    preset
        .iter()
        .map(render_step)
        .collect::<Result<Vec<_>>>()
        .map(|steps| steps.join("/"))
}

fn render_step(step: &PresetStep) -> Result<String> {
    if step.is_empty() {
        return Err(PhotoShareError::ValidationError(
            "transformation step is empty".to_string(),
        ));
    }

    let mut parts = Vec::with_capacity(step.len());
    for (name, value) in step {
        let code = short_code(name).ok_or_else(|| {
            PhotoShareError::ValidationError(format!("unknown transformation parameter: {name}"))
        })?;
        parts.push(format!("{code}_{}", render_value(name, value)?));
    }
    parts.sort();
    Ok(parts.join(","))
}

fn render_value(name: &str, value: &Value) -> Result<String> {
    let rendered = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    };

    let is_url_safe = rendered
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-' | '!'));
    if rendered.is_empty() || !is_url_safe {
        return Err(PhotoShareError::ValidationError(format!(
            "invalid value for transformation parameter {name}"
        )));
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn preset(value: serde_json::Value) -> Vec<PresetStep> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_build_avatar_preset() {
        let steps = preset(json!([
            {"gravity": "face", "height": 400, "width": 400, "crop": "crop"},
            {"radius": "max"},
            {"width": 200, "crop": "scale"},
            {"fetch_format": "auto"}
        ]));

        assert_eq!(
            build_transformation(&steps).unwrap(),
            "c_crop,g_face,h_400,w_400/r_max/c_scale,w_200/f_auto"
        );
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let steps = preset(json!([{"sharpness": 10}]));
        let err = build_transformation(&steps).unwrap_err();
        assert!(matches!(err, PhotoShareError::ValidationError(msg) if msg.contains("sharpness")));
    }

    #[test]
    fn test_empty_and_unsafe_values_rejected() {
        assert!(build_transformation(&[]).is_err());
        assert!(build_transformation(&preset(json!([{}]))).is_err());
        assert!(build_transformation(&preset(json!([{"effect": "a/b"}]))).is_err());
        assert!(build_transformation(&preset(json!([{"width": null}]))).is_err());
    }

    #[test]
    fn test_effect_with_argument() {
        let steps = preset(json!([{"effect": "sepia:80", "angle": -20}]));
        assert_eq!(build_transformation(&steps).unwrap(), "a_-20,e_sepia:80");
    }

    #[test]
    fn test_short_code() {
        assert_eq!(short_code("fetch_format"), Some("f"));
        assert_eq!(short_code("border"), Some("bo"));
        assert_eq!(short_code("nope"), None);
    }
}
