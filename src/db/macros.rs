//! Backend dispatch macros for reducing code duplication.
//!
//! Every backend-specific value in `db::pool` is an enum with one variant per
//! backend. These macros expand to the `match` over those variants while keeping
//! call sites linear.

/// Match a backend enum from `db::pool` and evaluate one arm per variant.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(DbPool, pool, {
///     MySql(p) => p.size(),
///     SQLite(p) => p.size(),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($kind:ident, $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $crate::db::pool::$kind::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
