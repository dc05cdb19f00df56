use std::ops::{Deref, DerefMut};
use zeroize::Zeroize;

/// Borrows a secret for the duration of one operation and zeroizes it when the
/// guard goes out of scope, whichever way the scope is left.
pub struct ScrubOnExit<'a, T: Zeroize + ?Sized> {
    secret: &'a mut T,
}

impl<'a, T: Zeroize + ?Sized> ScrubOnExit<'a, T> {
    pub fn new(secret: &'a mut T) -> Self {
        Self { secret }
    }
}

impl<T: Zeroize + ?Sized> Deref for ScrubOnExit<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.secret
    }
}

impl<T: Zeroize + ?Sized> DerefMut for ScrubOnExit<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.secret
    }
}

impl<T: Zeroize + ?Sized> Drop for ScrubOnExit<'_, T> {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}
