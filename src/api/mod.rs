mod impls;
mod pronostico;
mod requests;
mod responses;
mod util;

pub use pronostico::*;
pub use requests::*;
pub use responses::*;
pub use util::*;
