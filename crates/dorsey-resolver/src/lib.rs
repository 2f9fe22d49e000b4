mod select;

pub use select::{
    parse_versions, select_highest_compatible, select_highest_matching, select_latest,
};
