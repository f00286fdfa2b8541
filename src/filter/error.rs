/// Rejections raised while turning a [`FilterData`](super::FilterData) into SQL.
/// All of them come from caller input and surface as 400s.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Table name {0:?} is not a plain identifier")]
    InvalidTableName(String),
    #[error("Column name {0:?} is not a plain identifier")]
    InvalidColumn(String),
    #[error("Malformed where clause: {0}")]
    InvalidWhereClause(String),
    #[error("Operator {0} is not supported")]
    UnsupportedOperator(String),
    #[error("Bad operand: {0}")]
    InvalidOperatorData(String),
    #[error("Bad paging: {0}")]
    InvalidPaging(String),
}
