//! Route declarations, the ordered route table and handler types.

pub mod error;
pub mod route;
pub mod route_table;


pub use error::RouteError;
pub use route::{
	Route, RouteHandler, RouteId, RouteOptions, RoutedMessage, SharedHandler,
};
pub use route_table::{RouteMatch, RouteTable};
