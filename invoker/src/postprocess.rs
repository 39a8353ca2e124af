use crate::outcome::Outcome;

/// Element is a result value that post-processing can inspect: it may be null, and it may be a
/// list of further elements.
pub trait Element: Sized {
    fn is_null(&self) -> bool {
        false
    }

    /// Splits a list value into its items. Anything that is not a list is handed back unchanged.
    fn into_children(self) -> Result<Vec<Self>, Self> {
        Err(self)
    }
}

impl<T: Element> Element for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn into_children(self) -> Result<Vec<Self>, Self> {
        match self {
            Some(value) => value
                .into_children()
                .map(|children| children.into_iter().map(Some).collect())
                .map_err(Some),
            None => Err(None),
        }
    }
}

impl Element for serde_json::Value {
    fn is_null(&self) -> bool {
        self.is_null()
    }

    fn into_children(self) -> Result<Vec<Self>, Self> {
        match self {
            serde_json::Value::Array(items) => Ok(items),
            other => Err(other),
        }
    }
}

macro_rules! leaf_element {
    ($($ty:ty),* $(,)?) => {
        $(impl Element for $ty {})*
    };
}

leaf_element!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
);

/// Post-processing for the results of a list call. The steps run in a fixed order: flatten, then
/// drop nulls, then de-duplicate keeping the first occurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Postprocess {
    /// Flatten nested lists into a single level.
    pub flatten: bool,
    pub dropna: bool,
    pub unique: bool,
}

impl Postprocess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn with_dropna(mut self, dropna: bool) -> Self {
        self.dropna = dropna;
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn apply<V>(&self, values: Vec<V>) -> Vec<V>
    where
        V: Element + PartialEq,
    {
        self.apply_outcomes(values.into_iter().map(Outcome::Value).collect())
            .into_iter()
            .map(Outcome::into_value)
            .collect()
    }

    /// Same as [`Self::apply`] on the values of `outcomes`. Items produced by flattening keep the
    /// timing of the outcome they came from.
    pub(crate) fn apply_outcomes<V>(&self, outcomes: Vec<Outcome<V>>) -> Vec<Outcome<V>>
    where
        V: Element + PartialEq,
    {
        let mut items = if self.flatten {
            let mut flat = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                let (value, elapsed) = match outcome {
                    Outcome::Value(value) => (value, None),
                    Outcome::Timed { value, elapsed } => (value, Some(elapsed)),
                };
                let mut leaves = Vec::new();
                flatten_into(value, &mut leaves);
                flat.extend(leaves.into_iter().map(|value| match elapsed {
                    Some(elapsed) => Outcome::Timed { value, elapsed },
                    None => Outcome::Value(value),
                }));
            }
            flat
        } else {
            outcomes
        };

        if self.dropna {
            items.retain(|item| !item.value().is_null());
        }

        if self.unique {
            let mut unique: Vec<Outcome<V>> = Vec::with_capacity(items.len());
            for item in items {
                if !unique.iter().any(|seen| seen.value() == item.value()) {
                    unique.push(item);
                }
            }
            items = unique;
        }
        items
    }
}

fn flatten_into<V: Element>(value: V, out: &mut Vec<V>) {
    match value.into_children() {
        Ok(children) => {
            for child in children {
                flatten_into(child, out);
            }
        }
        Err(leaf) => out.push(leaf),
    }
}
