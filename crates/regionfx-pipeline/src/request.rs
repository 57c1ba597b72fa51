//! Requests: which effect to run, with which parameters, over which region.

use serde::{Deserialize, Serialize};

use crate::effect::{Effect, EffectKind};
use crate::types::{EffectParams, PipelineError, Polygon};

/// A validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub effect: Effect,
    /// Region of interest. Ignored by whole-frame effects.
    pub polygon: Polygon,
}

impl Request {
    #[must_use]
    pub const fn new(effect: Effect, polygon: Polygon) -> Self {
        Self { effect, polygon }
    }

    /// A request for a whole-frame effect with no region.
    #[must_use]
    pub const fn whole(effect: Effect) -> Self {
        Self {
            effect,
            polygon: Polygon::new(Vec::new()),
        }
    }

    /// Build a request from its call-surface form: an effect identifier,
    /// a flat `x0, y0, x1, y1, ...` coordinate list and numeric options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownEffect`] for an unregistered id and
    /// [`PipelineError::InvalidParameters`] for malformed coordinates or a
    /// missing option.
    pub fn from_wire(
        effect_id: &str,
        flat_points: &[f32],
        params: &EffectParams,
    ) -> Result<Self, PipelineError> {
        let kind: EffectKind = effect_id.parse()?;
        let effect = Effect::new(kind, params)?;
        let polygon = Polygon::from_flat(flat_points)?;
        Ok(Self { effect, polygon })
    }
}

/// Serialized request, as accepted by the JSON entry points.
///
/// ```json
/// { "effect": "masked-gaussian-blur", "points": [0, 0, 9, 0, 9, 9], "kernelRadius": 2 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    pub effect: String,
    /// Flat coordinate list, two entries per vertex.
    #[serde(default)]
    pub points: Vec<f32>,
    #[serde(flatten)]
    pub params: EffectParams,
}

impl WireRequest {
    /// Validate into a [`Request`].
    ///
    /// # Errors
    ///
    /// See [`Request::from_wire`].
    pub fn into_request(self) -> Result<Request, PipelineError> {
        Request::from_wire(&self.effect, &self.points, &self.params)
    }
}

impl From<&Request> for WireRequest {
    fn from(request: &Request) -> Self {
        Self {
            effect: request.effect.kind().id().to_string(),
            points: request
                .polygon
                .points()
                .iter()
                .flat_map(|p| [p.x, p.y])
                .collect(),
            params: request.effect.params(),
        }
    }
}
