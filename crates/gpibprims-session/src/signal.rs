//! Scoped signal masking for the calling thread.
//!
//! Bus libraries implement timeouts with `SIGALRM`. If the alarm lands while a
//! write or read is in flight the call comes back interrupted, so long-running
//! primitives run with the alarm blocked and the previous mask is put back when
//! the guard drops.

use std::marker::PhantomData;

use tracing::warn;

/// Blocks a signal on the current thread until dropped.
///
/// The saved mask belongs to the thread that created the guard, so the guard
/// is neither `Send` nor `Sync`.
pub struct SignalMaskGuard {
    #[cfg(unix)]
    saved: Option<libc::sigset_t>,
    _thread_bound: PhantomData<*const ()>,
}

impl SignalMaskGuard {
    /// Block `SIGALRM`.
    #[cfg(unix)]
    pub fn block_alarm() -> Self {
        Self::block(libc::SIGALRM)
    }

    /// Block `SIGALRM`. No-op on platforms without POSIX signals.
    #[cfg(not(unix))]
    pub fn block_alarm() -> Self {
        Self::disabled()
    }

    /// Block `signal` and remember the mask it replaced.
    ///
    /// If the mask cannot be changed the guard does nothing on drop; the
    /// failure is logged and the caller proceeds unmasked.
    #[cfg(unix)]
    pub fn block(signal: libc::c_int) -> Self {
        // SAFETY: both sigsets are valid writable values owned by this frame;
        // pthread_sigmask only touches the calling thread's mask.
        let saved = unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            let mut previous: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, signal);
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut previous);
            if rc == 0 {
                Some(previous)
            } else {
                warn!(signal, rc, "failed to block signal");
                None
            }
        };
        Self {
            saved,
            _thread_bound: PhantomData,
        }
    }

    /// A guard that leaves the mask alone.
    pub fn disabled() -> Self {
        Self {
            #[cfg(unix)]
            saved: None,
            _thread_bound: PhantomData,
        }
    }

    /// Whether this guard changed the mask and will restore it.
    #[cfg(unix)]
    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    /// Whether this guard changed the mask and will restore it.
    #[cfg(not(unix))]
    pub fn is_active(&self) -> bool {
        false
    }

    #[cfg(unix)]
    fn restore(&mut self) {
        let Some(previous) = self.saved.take() else {
            return;
        };
        // SAFETY: `previous` was filled in by pthread_sigmask on this thread;
        // a null old-set pointer is allowed.
        let rc =
            unsafe { libc::pthread_sigmask(libc::SIG_SETMASK, &previous, std::ptr::null_mut()) };
        if rc != 0 {
            warn!(rc, "failed to restore signal mask");
        }
    }

    #[cfg(not(unix))]
    fn restore(&mut self) {}
}

impl Drop for SignalMaskGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

impl std::fmt::Debug for SignalMaskGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalMaskGuard")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn blocked(signal: libc::c_int) -> bool {
        // SAFETY: querying the calling thread's mask into a local sigset.
        unsafe {
            let mut current: libc::sigset_t = std::mem::zeroed();
            assert_eq!(
                libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), &mut current),
                0
            );
            libc::sigismember(&current, signal) == 1
        }
    }

    // Tests run on their own threads, so each starts from the inherited mask
    // and cannot disturb the others.
    #[test]
    fn blocks_inside_scope_and_restores_after() {
        std::thread::spawn(|| {
            assert!(!blocked(libc::SIGALRM));
            {
                let guard = SignalMaskGuard::block_alarm();
                assert!(guard.is_active());
                assert!(blocked(libc::SIGALRM));
            }
            assert!(!blocked(libc::SIGALRM));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn restores_on_error_path() {
        fn failing() -> Result<(), &'static str> {
            let _guard = SignalMaskGuard::block_alarm();
            assert!(blocked(libc::SIGALRM));
            Err::<(), _>("device timeout")?;
            Ok(())
        }

        std::thread::spawn(|| {
            assert!(failing().is_err());
            assert!(!blocked(libc::SIGALRM));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn nested_guards_restore_the_outer_mask() {
        std::thread::spawn(|| {
            let outer = SignalMaskGuard::block(libc::SIGUSR1);
            {
                let _inner = SignalMaskGuard::block_alarm();
                assert!(blocked(libc::SIGUSR1));
                assert!(blocked(libc::SIGALRM));
            }
            assert!(blocked(libc::SIGUSR1));
            assert!(!blocked(libc::SIGALRM));
            drop(outer);
            assert!(!blocked(libc::SIGUSR1));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn disabled_guard_leaves_mask_untouched() {
        std::thread::spawn(|| {
            let guard = SignalMaskGuard::disabled();
            assert!(!guard.is_active());
            assert!(!blocked(libc::SIGALRM));
        })
        .join()
        .unwrap();
    }
}
