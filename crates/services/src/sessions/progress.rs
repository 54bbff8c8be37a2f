/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub scored: usize,
    pub page: usize,
    pub last_page: usize,
    pub is_complete: bool,
}
