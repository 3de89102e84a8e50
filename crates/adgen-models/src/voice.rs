//! Narration voice parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Text-to-speech configuration passed through to the narration service.
///
/// Serialized in snake_case because the speech model reads these keys
/// verbatim from its input object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct VoiceParams {
    #[validate(range(min = -12, max = 12))]
    pub pitch: i32,
    #[validate(range(min = 0.5, max = 2.0))]
    pub speed: f32,
    #[validate(range(min = 0.0, max = 10.0))]
    pub volume: f32,
    pub bitrate: u32,
    pub channel: String,
    pub emotion: String,
    #[validate(length(min = 1))]
    pub voice_id: String,
    pub sample_rate: u32,
    pub language_boost: String,
    pub english_normalization: bool,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            pitch: 0,
            speed: 1.0,
            volume: 1.0,
            bitrate: 128_000,
            channel: "mono".to_string(),
            emotion: "auto".to_string(),
            voice_id: "English_CalmWoman".to_string(),
            sample_rate: 32_000,
            language_boost: "English".to_string(),
            english_normalization: true,
        }
    }
}

impl VoiceParams {
    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(VoiceParams::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_speed() {
        let params = VoiceParams {
            speed: 4.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_empty_voice_rejected() {
        assert!(VoiceParams::default().with_voice("").validate().is_err());
    }

    #[test]
    fn test_serialized_keys() {
        let json = serde_json::to_value(VoiceParams::default()).unwrap();
        assert_eq!(json["voice_id"], "English_CalmWoman");
        assert_eq!(json["sample_rate"], 32000);
        assert_eq!(json["english_normalization"], true);
    }
}
