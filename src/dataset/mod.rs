mod describe;
mod table;

pub use describe::{
    CATEGORICAL_LIMIT, PREVIEW_ROWS, column_notes, exploration_summary, preview_table,
};
pub use table::{Column, ColumnType, Dataset, DatasetError, dataset_name_from_path};
