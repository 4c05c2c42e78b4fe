pub mod cli;
pub mod constants;
pub mod dispatch;
pub mod errors;
pub mod gtf;
pub mod interval;
pub mod io;
pub mod isoform;
pub mod molecule;
pub mod read;
pub mod reconstruct;
pub mod stitch;
