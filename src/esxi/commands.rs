use std::borrow::Cow;

use shell_escape::unix::escape;

/// Print the Vmid column of every registered VM, header row excluded.
pub const LIST_VMS: &str = "vim-cmd vmsvc/getallvms | awk '{ print $1 }' | grep -v Vmid";

/// Guest information (hostname, IP, guest family/id/state) for one VM.
pub fn get_guest(id: &str) -> String {
    format!("vim-cmd vmsvc/get.guest {}", escape(Cow::Borrowed(id)))
}

/// VM summary, which carries the annotation (notes).
pub fn get_summary(id: &str) -> String {
    format!("vim-cmd vmsvc/get.summary {}", escape(Cow::Borrowed(id)))
}
