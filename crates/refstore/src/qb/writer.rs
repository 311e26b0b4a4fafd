//! Statement text accumulator with a single running placeholder counter.

use crate::qb::ident::Ident;
use crate::qb::param::{Param, ParamList};
use std::fmt::Write;

/// Accumulates SQL text and bound values.
///
/// Every value passes through [`SqlWriter::push_param`], which appends it to
/// the parameter list and writes its `$n` placeholder at the same moment, so
/// placeholder order and argument order cannot diverge.
///
/// In debug mode values are written inline (via `Debug`) and no parameters
/// are collected; the output is for error messages and logs only.
pub(crate) struct SqlWriter {
    sql: String,
    params: ParamList,
    debug: bool,
}

impl SqlWriter {
    pub(crate) fn new() -> Self {
        Self {
            sql: String::with_capacity(128),
            params: ParamList::new(),
            debug: false,
        }
    }

    pub(crate) fn debug() -> Self {
        Self {
            sql: String::new(),
            params: ParamList::new(),
            debug: true,
        }
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub(crate) fn push_ident(&mut self, ident: &Ident) {
        self.sql.push_str(ident.as_sql());
    }

    pub(crate) fn push_param(&mut self, param: &Param) {
        if self.debug {
            let _ = write!(self.sql, "{param:?}");
        } else {
            let n = self.params.push_param(param.clone());
            let _ = write!(self.sql, "${n}");
        }
    }

    /// Write `items` separated by `sep`, each rendered by `f`.
    pub(crate) fn push_separated<I, F>(&mut self, items: I, sep: &str, mut f: F)
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item),
    {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(sep);
            }
            f(self, item);
        }
    }

    pub(crate) fn finish(self) -> (String, ParamList) {
        (self.sql, self.params)
    }
}
