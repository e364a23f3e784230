pub mod defs;

pub use defs::{
    NewsItem, NewsItemRecord, NewsQuery, ParseParamError, SortField, SortOrder, SourceInfo,
};
