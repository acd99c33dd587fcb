mod chat_coordinator;

pub use chat_coordinator::{
    clamp_history_count, ChatCoordinator, ChatCoordinatorDependencies, CoordinatorSettings,
    MAX_HISTORY_COUNT, MIN_HISTORY_COUNT,
};
