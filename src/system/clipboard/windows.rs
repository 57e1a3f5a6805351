//! Windows clipboard sequence number.

/// `GetClipboardSequenceNumber`; `None` when the process has no window station access.
pub(super) fn sequence_number() -> Option<u64> {
    clipboard_win::raw::seq_num().map(|seq| u64::from(seq.get()))
}
