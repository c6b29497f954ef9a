/// Turns one raw response body into at most one record
///
/// Implementations must be pure: the same bytes always give the same result,
/// and no state is shared between calls, so one parser can serve every
/// worker thread at once. A malformed body yields `None`, never a panic.
pub trait RecordParser: Send + Sync {
    type Record: Send + 'static;

    fn parse(&self, raw: &[u8]) -> Option<Self::Record>;
}

impl<F, R> RecordParser for F
where
    F: Fn(&[u8]) -> Option<R> + Send + Sync,
    R: Send + 'static,
{
    type Record = R;

    #[inline]
    fn parse(&self, raw: &[u8]) -> Option<R> {
        self(raw)
    }
}
