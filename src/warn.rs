//! Printing diagnostics to stderr

#[macro_export]
macro_rules! warn {
    ($formatstr:expr $(,$arg:expr)*) => { {
        use std::io::Write;
        let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
        let _ = write!(&mut outp, "W: ");
        let _ = write!(&mut outp, $formatstr $(,$arg)*);
        let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
        let _ = outp.flush();
    } }
}

#[macro_export]
macro_rules! nowarn {
    ($formatstr:expr $(,$arg:expr)*) => {
    }
}

/// Only prints if the `DO_WARN_THREAD` flag in
/// `crate::warn` has been switched on via
/// `multisite::warn::DO_WARN_THREAD.store(true,
/// std::sync::atomic::Ordering::SeqCst);`. Prefixes the thread id.
#[macro_export]
macro_rules! warn_thread {
    { $fmt:expr $(,$arg:expr)* } => {
        if $crate::warn::DO_WARN_THREAD.load(std::sync::atomic::Ordering::SeqCst) {
            use std::io::Write;
            let mut outp = std::io::BufWriter::new(std::io::stderr().lock());
            let _ = write!(&mut outp, "{:?} W: ", std::thread::current().id());
            let _ = write!(&mut outp, $fmt $(,$arg)*);
            let _ = writeln!(&mut outp, " at {:?} line {}", file!(), line!());
            let _ = outp.flush();
        }
    }
}

pub static DO_WARN_THREAD: std::sync::atomic::AtomicBool =
    std::sync::atomic::AtomicBool::new(false);
