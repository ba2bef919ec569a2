pub mod inspect;
pub mod run;

pub use inspect::inspect;
pub use run::run;
