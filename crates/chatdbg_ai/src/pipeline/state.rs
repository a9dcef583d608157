/// Where an `answer_query` invocation is. `Answered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    RetrieveOriginal,
    Reformulate,
    /// Probing the variant at this position in the reformulator's output.
    RetryingVariant(usize),
    Fallback,
    Answered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Begin,
    /// Verification reached Strong or Partial support.
    Supported,
    /// No support, no decision, or no hits. All three move on.
    NotSupported,
    VariantsReady,
    FallbackReady,
}

impl Stage {
    /// Transition table. `None` for an event the stage does not accept.
    pub fn next(self, event: Event, variant_count: usize) -> Option<Stage> {
        use Event::*;
        use Stage::*;
        match (self, event) {
            (Start, Begin) => Some(RetrieveOriginal),
            (RetrieveOriginal, Supported) => Some(Answered),
            (RetrieveOriginal, NotSupported) => Some(Reformulate),
            (Reformulate, VariantsReady) if variant_count > 0 => Some(RetryingVariant(0)),
            (Reformulate, VariantsReady) => Some(Fallback),
            (RetryingVariant(_), Supported) => Some(Answered),
            (RetryingVariant(i), NotSupported) if i + 1 < variant_count => {
                Some(RetryingVariant(i + 1))
            }
            (RetryingVariant(_), NotSupported) => Some(Fallback),
            (Fallback, FallbackReady) => Some(Answered),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Answered)
    }
}
