mod route;
mod session;
mod turn;

pub use route::RequestKind;
pub use session::{ChatSession, ConversationTurn, GREETING, Role};
pub use turn::{
    GENERATION_FAILED_NOTICE, MISSING_API_KEY_NOTICE, NO_DATASET_NOTICE, NO_SCRIPT_NOTICE,
    PLOT_CREATED_MESSAGE, TurnOutcome, TurnReport, UPLOAD_FAILED_NOTICE, add_dataset, handle_turn,
    upload_dataset,
};
