pub mod check;
pub mod estimate;
pub mod parse;
pub mod run;
