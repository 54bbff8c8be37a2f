use serde::Serialize;

use headcheck_core::model::{Answer, PresentationId};

/// One trial as the UI should render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialView {
    #[serde(serialize_with = "as_display")]
    pub id: PresentationId,
    pub src: String,
    pub selection: Option<Answer>,
    pub locked: bool,
}

/// Render request for the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub page: usize,
    pub last_page: usize,
    pub is_last_page: bool,
    pub trials: Vec<TrialView>,
}

fn as_display<S: serde::Serializer>(id: &PresentationId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use headcheck_core::model::StimulusId;

    #[test]
    fn trial_view_serializes_presentation_handle() {
        let view = TrialView {
            id: PresentationId::new(2, StimulusId::new("7")),
            src: "seven.wav".into(),
            selection: Some(Answer::new("1")),
            locked: false,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], "trial2-src7");
        assert_eq!(json["selection"], "1");
    }
}
