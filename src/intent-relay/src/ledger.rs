//! Per-wallet nonce ledger.
//!
//! Each wallet moves through `Available -> Reserved -> {Committed | Released}`:
//!
//! ```text
//!   reserve()            commit(n)
//! next = n ──────► in_flight = n ──────► next = n + 1
//!                       │
//!                       └────────────► next = n  (release(n): reissued as-is)
//! ```
//!
//! At most one reservation per wallet is outstanding, so `release` always returns the highest
//! issued value and no nonce is ever skipped or reused out of order. The lock is held only for
//! the bookkeeping itself, never across signing or relaying.

use std::collections::HashMap;

use alloy_primitives::Address;
use intent_relay_types::Nonce;
use parking_lot::Mutex;

use crate::errors::LedgerError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct WalletNonces {
    /// Next nonce to issue (`last_committed + 1`, or 0).
    next: Nonce,
    in_flight: Option<Nonce>,
}

/// Snapshot of a wallet's nonce state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NonceStatus {
    pub next: Nonce,
    pub in_flight: Option<Nonce>,
}

#[derive(Debug, Default)]
pub struct NonceLedger {
    wallets: Mutex<HashMap<Address, WalletNonces>>,
}

impl NonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next nonce for `wallet` and mark it in flight.
    ///
    /// # Errors
    ///
    /// [`LedgerError::WalletBusy`] while another reservation is outstanding.
    pub fn reserve(&self, wallet: Address) -> Result<Nonce, LedgerError> {
        let mut wallets = self.wallets.lock();
        let entry = wallets.entry(wallet).or_default();
        if let Some(outstanding) = entry.in_flight {
            return Err(LedgerError::WalletBusy {
                wallet,
                outstanding,
            });
        }
        let nonce = entry.next;
        if nonce.checked_next().is_none() {
            return Err(LedgerError::Exhausted(wallet));
        }
        entry.in_flight = Some(nonce);
        tracing::info!(%wallet, %nonce, "nonce reserved");
        Ok(nonce)
    }

    /// Confirm execution of the outstanding reservation `nonce`.
    pub fn commit(&self, wallet: Address, nonce: Nonce) -> Result<(), LedgerError> {
        let mut wallets = self.wallets.lock();
        let entry = Self::outstanding(&mut wallets, wallet, nonce)?;
        entry.next = nonce.checked_next().ok_or(LedgerError::Exhausted(wallet))?;
        entry.in_flight = None;
        tracing::info!(%wallet, %nonce, "nonce committed");
        Ok(())
    }

    /// Give the outstanding reservation `nonce` back; the next `reserve` reissues it.
    pub fn release(&self, wallet: Address, nonce: Nonce) -> Result<(), LedgerError> {
        let mut wallets = self.wallets.lock();
        let entry = Self::outstanding(&mut wallets, wallet, nonce)?;
        entry.in_flight = None;
        tracing::info!(%wallet, %nonce, "nonce released");
        Ok(())
    }

    /// Align with the executor's stored nonce (the next nonce it will accept).
    ///
    /// Refused while a reservation is outstanding, and refused if it would move backwards.
    pub fn sync(&self, wallet: Address, next: Nonce) -> Result<(), LedgerError> {
        let mut wallets = self.wallets.lock();
        let entry = wallets.entry(wallet).or_default();
        if let Some(outstanding) = entry.in_flight {
            return Err(LedgerError::WalletBusy {
                wallet,
                outstanding,
            });
        }
        if next < entry.next {
            return Err(LedgerError::Regression {
                wallet,
                current: entry.next,
                requested: next,
            });
        }
        if next != entry.next {
            tracing::info!(%wallet, from = %entry.next, to = %next, "nonce ledger synced");
        }
        entry.next = next;
        Ok(())
    }

    pub fn status(&self, wallet: Address) -> NonceStatus {
        let entry = self
            .wallets
            .lock()
            .get(&wallet)
            .copied()
            .unwrap_or_default();
        NonceStatus {
            next: entry.next,
            in_flight: entry.in_flight,
        }
    }

    fn outstanding(
        wallets: &mut HashMap<Address, WalletNonces>,
        wallet: Address,
        nonce: Nonce,
    ) -> Result<&mut WalletNonces, LedgerError> {
        match wallets.get_mut(&wallet) {
            Some(entry) if entry.in_flight == Some(nonce) => Ok(entry),
            _ => Err(LedgerError::NotReserved { wallet, nonce }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy_primitives::address;

    use super::*;

    const A: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const B: Address = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

    #[test]
    fn test_commits_are_gapless() {
        let ledger = NonceLedger::new();
        for expected in 0..5u64 {
            let nonce = ledger.reserve(A).unwrap();
            assert_eq!(nonce, Nonce(expected));
            ledger.commit(A, nonce).unwrap();
        }
        assert_eq!(
            ledger.status(A),
            NonceStatus {
                next: Nonce(5),
                in_flight: None
            }
        );
    }

    #[test]
    fn test_second_reserve_is_busy() {
        let ledger = NonceLedger::new();
        let first = ledger.reserve(A).unwrap();
        assert_eq!(
            ledger.reserve(A),
            Err(LedgerError::WalletBusy {
                wallet: A,
                outstanding: first
            })
        );
        // Unrelated wallets are independent.
        assert_eq!(ledger.reserve(B).unwrap(), Nonce(0));
    }

    #[test]
    fn test_release_reissues_same_nonce() {
        let ledger = NonceLedger::new();
        let n0 = ledger.reserve(A).unwrap();
        ledger.commit(A, n0).unwrap();

        let n1 = ledger.reserve(A).unwrap();
        ledger.release(A, n1).unwrap();
        assert_eq!(ledger.reserve(A).unwrap(), n1);
    }

    #[test]
    fn test_commit_or_release_requires_outstanding() {
        let ledger = NonceLedger::new();
        assert_eq!(
            ledger.commit(A, Nonce(0)),
            Err(LedgerError::NotReserved {
                wallet: A,
                nonce: Nonce(0)
            })
        );

        let n = ledger.reserve(A).unwrap();
        assert_eq!(
            ledger.release(A, Nonce(3)),
            Err(LedgerError::NotReserved {
                wallet: A,
                nonce: Nonce(3)
            })
        );
        ledger.commit(A, n).unwrap();
        // Already committed: neither a second commit nor a release applies.
        assert!(ledger.commit(A, n).is_err());
        assert!(ledger.release(A, n).is_err());
    }

    #[test]
    fn test_sync() {
        let ledger = NonceLedger::new();
        ledger.sync(A, Nonce(10)).unwrap();
        assert_eq!(ledger.reserve(A).unwrap(), Nonce(10));

        assert!(matches!(
            ledger.sync(A, Nonce(12)),
            Err(LedgerError::WalletBusy { .. })
        ));
        ledger.release(A, Nonce(10)).unwrap();

        assert_eq!(
            ledger.sync(A, Nonce(3)),
            Err(LedgerError::Regression {
                wallet: A,
                current: Nonce(10),
                requested: Nonce(3)
            })
        );
    }

    #[test]
    fn test_exhausted() {
        let ledger = NonceLedger::new();
        ledger.sync(A, Nonce(u64::MAX)).unwrap();
        assert_eq!(ledger.reserve(A), Err(LedgerError::Exhausted(A)));
    }

    #[test]
    fn test_concurrent_reserve_single_winner() {
        let ledger = Arc::new(NonceLedger::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.reserve(A))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(
                e,
                LedgerError::WalletBusy { outstanding, .. } if *outstanding == Nonce(0)
            )));
    }
}
