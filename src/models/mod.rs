pub mod loaders;
pub mod navigation;
pub mod preferences;
pub mod problem;

pub use loaders::{load_preferences, load_preferences_file};
pub use navigation::{Direction, NavigationState, Order, PageEntry, StatementEntry};
pub use preferences::Preferences;
pub use problem::{ContestKind, ContestRef, ProblemIndex};
