//! Representative test values and call-tuple combination.
//!
//! Every parameter type a verifiable call site uses has a fixed list of
//! representative values: `bool` contributes both values, enums every
//! variant, optionals an absent and a populated instance, and the remaining
//! primitives a single fixed literal. [`ArgSet::combinations`] turns a
//! parameter tuple into the call tuples the harness feeds through a site.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::choice::Choice;
use crate::error::{LiftError, LiftResult};
use crate::param::{Bag, Clustered, Deferred, ToParam, Typed, Varchar};

/// Representative values for one parameter type.
pub trait TestValues: Sized + Clone {
    /// Participates in the cluster rule (see [`Clustered`]).
    const CLUSTERED: bool = false;

    fn test_values() -> Vec<Self>;
}

/// The first representative value of a type.
pub fn first_value<T: TestValues>() -> LiftResult<T> {
    T::test_values()
        .into_iter()
        .next()
        .ok_or(LiftError::NoTestValues(std::any::type_name::<T>()))
}

fn representative_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2001, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("literal timestamp")
}

impl TestValues for String {
    fn test_values() -> Vec<Self> {
        vec!["test".to_string()]
    }
}

impl TestValues for Varchar {
    fn test_values() -> Vec<Self> {
        vec![Varchar::new("test")]
    }
}

impl TestValues for i32 {
    fn test_values() -> Vec<Self> {
        vec![0]
    }
}

impl TestValues for i64 {
    fn test_values() -> Vec<Self> {
        vec![0]
    }
}

impl TestValues for Decimal {
    fn test_values() -> Vec<Self> {
        vec![Decimal::ZERO]
    }
}

impl TestValues for Uuid {
    fn test_values() -> Vec<Self> {
        vec![Uuid::nil()]
    }
}

impl TestValues for NaiveDateTime {
    fn test_values() -> Vec<Self> {
        vec![representative_timestamp()]
    }
}

impl TestValues for bool {
    fn test_values() -> Vec<Self> {
        vec![true, false]
    }
}

impl<T: TestValues> TestValues for Option<T> {
    fn test_values() -> Vec<Self> {
        let mut values = vec![None];
        if let Ok(first) = first_value::<T>() {
            values.push(Some(first));
        }
        values
    }
}

impl<A: TestValues, B: TestValues> TestValues for Choice<A, B> {
    fn test_values() -> Vec<Self> {
        let mut values = Vec::new();
        if let Ok(a) = first_value::<A>() {
            values.push(Choice::First(a));
        }
        if let Ok(b) = first_value::<B>() {
            values.push(Choice::Second(b));
        }
        values
    }
}

impl<T: TestValues + ToParam> TestValues for Typed<T> {
    fn test_values() -> Vec<Self> {
        first_value::<T>()
            .ok()
            .map(|value| {
                let sql_type = value.to_param().sql_type();
                Typed { value, sql_type }
            })
            .into_iter()
            .collect()
    }
}

impl<T: TestValues> TestValues for Bag<T> {
    fn test_values() -> Vec<Self> {
        first_value::<T>().ok().map(Bag).into_iter().collect()
    }
}

impl<T: TestValues> TestValues for Clustered<T> {
    const CLUSTERED: bool = true;

    fn test_values() -> Vec<Self> {
        T::test_values().into_iter().map(Clustered).collect()
    }
}

impl<T: TestValues + Send + Sync + 'static> TestValues for Deferred<T> {
    fn test_values() -> Vec<Self> {
        first_value::<T>()
            .ok()
            .map(|first| -> Deferred<T> { Arc::new(move || first.clone()) })
            .into_iter()
            .collect()
    }
}

tokio::task_local! {
    static FIRST_ONLY: bool;
}

/// Whether the current task runs in first-only mode.
pub fn first_only_active() -> bool {
    FIRST_ONLY.try_with(|v| *v).unwrap_or(false)
}

/// Run a future in first-only mode: combinations collapse to a single tuple
/// of first values. The mode follows the future across await points but not
/// into independently spawned tasks.
pub async fn with_first_only<F: std::future::Future>(fut: F) -> F::Output {
    FIRST_ONLY.scope(true, fut).await
}

/// A parameter tuple that can enumerate its call tuples.
pub trait ArgSet: Sized {
    fn combinations() -> LiftResult<Vec<Self>>;
}

impl ArgSet for () {
    fn combinations() -> LiftResult<Vec<Self>> {
        Ok(vec![()])
    }
}

// Nested loops over the value lists, one per position.
macro_rules! cross_rows {
    ($out:ident, ($($done:ident)*),) => {
        $out.push(($($done.clone(),)*));
    };
    ($out:ident, ($($done:ident)*), $head:ident $(, $rest:ident)*) => {
        for $head in $head.iter() {
            cross_rows!($out, ($($done)* $head), $($rest),*);
        }
    };
}

// One block per clustered position: vary it fully, pin everything else to
// its first value.
macro_rules! cluster_rows {
    ($out:ident, ($($pre:ident)*),) => {};
    ($out:ident, ($($pre:ident)*), $head:ident : $HeadT:ident $(, $rest:ident : $RestT:ident)*) => {
        if <$HeadT as TestValues>::CLUSTERED {
            for item in $head.iter() {
                $out.push(($($pre[0].clone(),)* item.clone(), $($rest[0].clone(),)*));
            }
        }
        cluster_rows!($out, ($($pre)* $head), $($rest : $RestT),*);
    };
}

macro_rules! impl_arg_set {
    ($(($var:ident, $T:ident)),+) => {
        impl<$($T: TestValues),+> ArgSet for ($($T,)+) {
            fn combinations() -> LiftResult<Vec<Self>> {
                $(
                    let $var = <$T as TestValues>::test_values();
                    if $var.is_empty() {
                        return Err(LiftError::NoTestValues(std::any::type_name::<$T>()));
                    }
                )+
                if first_only_active() {
                    return Ok(vec![($($var[0].clone(),)+)]);
                }
                let clustered = false $(|| <$T as TestValues>::CLUSTERED)+;
                let mut rows = Vec::new();
                if clustered {
                    cluster_rows!(rows, (), $($var : $T),+);
                } else {
                    cross_rows!(rows, (), $($var),+);
                }
                Ok(rows)
            }
        }
    };
}

impl_arg_set!((a, A));
impl_arg_set!((a, A), (b, B));
impl_arg_set!((a, A), (b, B), (c, C));
impl_arg_set!((a, A), (b, B), (c, C), (d, D));
impl_arg_set!((a, A), (b, B), (c, C), (d, D), (e, E));
impl_arg_set!((a, A), (b, B), (c, C), (d, D), (e, E), (f, F));
impl_arg_set!((a, A), (b, B), (c, C), (d, D), (e, E), (f, F), (g, G));
impl_arg_set!((a, A), (b, B), (c, C), (d, D), (e, E), (f, F), (g, G), (h, H));
