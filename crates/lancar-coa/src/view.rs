use lancar_core::AccountNode;

/// What the tree pane should render for a given search query.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeView {
    /// The full tree, or the filtered subset while a search is active.
    Accounts(Vec<AccountNode>),
    /// A search is active and nothing matched it.
    NoMatches { query: String },
    /// The company has no accounts yet.
    Empty,
    /// The first load failed and there is nothing to fall back to.
    Unavailable,
}
