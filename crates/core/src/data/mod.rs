pub mod io;

pub use io::read_ancestor_records;
