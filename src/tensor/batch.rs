/// A single value or an ordered, possibly nested, sequence of values.
///
/// Model operations accept either one minibatch or a list of minibatches and
/// answer with the same structure, so a `Sequence` of three batches encodes to a
/// `Sequence` of three encodings in the same order.
#[derive(Debug, Clone, PartialEq)]
pub enum Batched<X> {
    Single(X),
    Sequence(Vec<Batched<X>>),
}

impl<X> From<X> for Batched<X> {
    fn from(value: X) -> Self {
        Batched::Single(value)
    }
}

impl<X> Batched<X> {
    /// Wrap every item as a `Single` and collect them into a `Sequence`.
    pub fn sequence<I: IntoIterator<Item = X>>(items: I) -> Self {
        Batched::Sequence(items.into_iter().map(Batched::Single).collect())
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Batched::Single(_))
    }

    pub fn as_single(&self) -> Option<&X> {
        match self {
            Batched::Single(x) => Some(x),
            Batched::Sequence(_) => None,
        }
    }

    pub fn into_single(self) -> Option<X> {
        match self {
            Batched::Single(x) => Some(x),
            Batched::Sequence(_) => None,
        }
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        match self {
            Batched::Single(_) => 1,
            Batched::Sequence(items) => items.iter().map(Batched::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth-first iterator over the leaves.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &X> + '_> {
        match self {
            Batched::Single(x) => Box::new(std::iter::once(x)),
            Batched::Sequence(items) => Box::new(items.iter().flat_map(|item| item.iter())),
        }
    }

    pub fn map<Y, F>(&self, mut f: F) -> Batched<Y>
    where
        F: FnMut(&X) -> Y,
    {
        self.map_inner(&mut f)
    }

    fn map_inner<Y, F>(&self, f: &mut F) -> Batched<Y>
    where
        F: FnMut(&X) -> Y,
    {
        match self {
            Batched::Single(x) => Batched::Single(f(x)),
            Batched::Sequence(items) => {
                Batched::Sequence(items.iter().map(|item| item.map_inner(f)).collect())
            }
        }
    }

    /// Like [`Batched::map`], stopping at the first error.
    pub fn try_map<Y, E, F>(&self, mut f: F) -> Result<Batched<Y>, E>
    where
        F: FnMut(&X) -> Result<Y, E>,
    {
        self.try_map_inner(&mut f)
    }

    fn try_map_inner<Y, E, F>(&self, f: &mut F) -> Result<Batched<Y>, E>
    where
        F: FnMut(&X) -> Result<Y, E>,
    {
        match self {
            Batched::Single(x) => Ok(Batched::Single(f(x)?)),
            Batched::Sequence(items) => items
                .iter()
                .map(|item| item.try_map_inner(f))
                .collect::<Result<Vec<_>, E>>()
                .map(Batched::Sequence),
        }
    }
}

#[test]
fn test_map_preserves_order_and_nesting() {
    let batches = Batched::Sequence(vec![
        Batched::Single(1),
        Batched::sequence(vec![2, 3]),
        Batched::Single(4),
    ]);
    let doubled = batches.map(|x| x * 2);
    assert_eq!(
        doubled,
        Batched::Sequence(vec![
            Batched::Single(2),
            Batched::sequence(vec![4, 6]),
            Batched::Single(8),
        ])
    );
    assert_eq!(doubled.iter().copied().collect::<Vec<_>>(), vec![2, 4, 6, 8]);
    assert_eq!(doubled.len(), 4);
}

#[test]
fn test_try_map_short_circuits() {
    let batches = Batched::sequence(vec![1, -1, 2]);
    let mut seen = Vec::new();
    let res: Result<Batched<i32>, String> = batches.try_map(|&x| {
        seen.push(x);
        if x < 0 {
            Err(format!("negative: {x}"))
        } else {
            Ok(x)
        }
    });
    assert_eq!(res, Err("negative: -1".to_string()));
    assert_eq!(seen, vec![1, -1]);
}

#[test]
fn test_single_accessors() {
    let single = Batched::from(7);
    assert!(single.is_single());
    assert_eq!(single.as_single(), Some(&7));
    assert_eq!(single.into_single(), Some(7));
    assert_eq!(Batched::sequence(vec![1]).into_single(), None);
    assert!(Batched::<i32>::Sequence(vec![]).is_empty());
}
