/// Identity and topics of one simulation component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentConfig {
    pub simulation_id: String,
    pub component_name: String,
    pub epoch_topic: String,
    pub simulation_state_topic: String,
    pub status_topic: String,
    pub error_topic: String,
    /// Extra patterns whose messages go to [`crate::EpochProcessor::handle_message`].
    pub other_topics: Vec<String>,
}

impl ComponentConfig {
    pub fn new(simulation_id: impl Into<String>, component_name: impl Into<String>) -> Self {
        Self {
            simulation_id: simulation_id.into(),
            component_name: component_name.into(),
            ..Self::default()
        }
    }

    pub fn with_other_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.other_topics = topics.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            simulation_id: "2020-01-01T00:00:00.000Z".to_owned(),
            component_name: "component".to_owned(),
            epoch_topic: "Epoch".to_owned(),
            simulation_state_topic: "SimState".to_owned(),
            status_topic: "Status.Ready".to_owned(),
            error_topic: "Status.Error".to_owned(),
            other_topics: Vec::new(),
        }
    }
}
