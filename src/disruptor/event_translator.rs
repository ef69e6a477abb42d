//! Event Translators
//!
//! Translators populate a claimed slot in place. Closures of the matching
//! shape implement the traits directly, so most callers never name a type.

/// Populates a claimed event before it is published
///
/// # Examples
/// ```
/// use ringway::disruptor::EventTranslator;
///
/// #[derive(Default)]
/// struct Order {
///     id: u64,
///     sequence: i64,
/// }
///
/// struct NewOrder(u64);
///
/// impl EventTranslator<Order> for NewOrder {
///     fn translate_to(&self, event: &mut Order, sequence: i64) {
///         event.id = self.0;
///         event.sequence = sequence;
///     }
/// }
/// ```
pub trait EventTranslator<T> {
    /// # Arguments
    /// * `event` - The pre-allocated slot, exclusively owned until publish
    /// * `sequence` - The sequence claimed for this slot
    fn translate_to(&self, event: &mut T, sequence: i64);
}

impl<T, F> EventTranslator<T> for F
where
    F: Fn(&mut T, i64),
{
    fn translate_to(&self, event: &mut T, sequence: i64) {
        self(event, sequence)
    }
}

/// Translator taking one caller-supplied argument
pub trait EventTranslatorOneArg<T, A> {
    fn translate_to(&self, event: &mut T, sequence: i64, arg0: A);
}

impl<T, A, F> EventTranslatorOneArg<T, A> for F
where
    F: Fn(&mut T, i64, A),
{
    fn translate_to(&self, event: &mut T, sequence: i64, arg0: A) {
        self(event, sequence, arg0)
    }
}

/// Translator taking two caller-supplied arguments
pub trait EventTranslatorTwoArg<T, A, B> {
    fn translate_to(&self, event: &mut T, sequence: i64, arg0: A, arg1: B);
}

impl<T, A, B, F> EventTranslatorTwoArg<T, A, B> for F
where
    F: Fn(&mut T, i64, A, B),
{
    fn translate_to(&self, event: &mut T, sequence: i64, arg0: A, arg1: B) {
        self(event, sequence, arg0, arg1)
    }
}
