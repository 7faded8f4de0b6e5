mod primer;
mod response;

pub use primer::{Primer, assemble_question, build_primer, dataset_reference};
pub use response::{DATA_LOADING_CALL, PLOT_DISPLAY_CALL, is_renderable, strip_data_loading_line};
