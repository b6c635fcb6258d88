// Lesson registry and runner
use std::fs;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use tracing::info;

use crate::dataset::{DataRows, Dataset};
use crate::deleter::CountingDeleter;
use crate::error::{HandleError, Result};
use crate::forwarding::{use_pair, Queue};
use crate::gadget::{consume, create_gadget, use_gadget, Device, Gadget, Owner};
use crate::guard::{stream_guard, write_text, Stream};
use crate::handle::ExclusiveHandle;
use crate::vacancy::find_empty;

/// Lines a lesson prints, kept so the runner and the tests can both use them.
#[derive(Debug, Default)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

#[derive(Clone, Copy)]
pub struct Lesson {
    pub id: &'static str,
    pub title: &'static str,
    pub run: fn(&mut Transcript) -> Result<()>,
}

const CATALOG: &[Lesson] = &[
    Lesson {
        id: "basics",
        title: "Owning a gadget on the heap",
        run: basics,
    },
    Lesson {
        id: "transfer",
        title: "Transfer construction and transfer assignment",
        run: transfer,
    },
    Lesson {
        id: "release-reset",
        title: "Escape hatches: release and reset",
        run: release_reset,
    },
    Lesson {
        id: "custom-deleter",
        title: "Custom deleters for streams and files",
        run: custom_deleter,
    },
    Lesson {
        id: "array",
        title: "Owning an array",
        run: array,
    },
    Lesson {
        id: "shared",
        title: "From exclusive to shared ownership",
        run: shared,
    },
    Lesson {
        id: "dataset",
        title: "Copy versus move for a value type",
        run: dataset,
    },
    Lesson {
        id: "forwarding",
        title: "Forwarding arguments unchanged",
        run: forwarding,
    },
    Lesson {
        id: "owner",
        title: "Types that hold a handle",
        run: owner,
    },
    Lesson {
        id: "queue",
        title: "A queue that copies borrowed items and moves owned ones",
        run: queue,
    },
    Lesson {
        id: "find-empty",
        title: "Finding the first empty pointer",
        run: find_empty_pointer,
    },
    Lesson {
        id: "device",
        title: "Handing out shared ownership of yourself",
        run: device,
    },
];

pub fn catalog() -> &'static [Lesson] {
    CATALOG
}

pub fn find(id: &str) -> Result<&'static Lesson> {
    CATALOG
        .iter()
        .find(|lesson| lesson.id == id)
        .ok_or_else(|| HandleError::unknown_lesson(id))
}

/// Resolves `ids` in order. An empty list selects the whole catalog.
pub fn select(ids: &[String]) -> Result<Vec<&'static Lesson>> {
    if ids.is_empty() {
        return Ok(CATALOG.iter().collect());
    }
    ids.iter().map(|id| find(id)).collect()
}

pub fn run_lesson(id: &str, out: &mut Transcript) -> Result<()> {
    let lesson = find(id)?;
    info!(lesson = lesson.id, "running lesson");
    (lesson.run)(out)
}

/// Runs the whole catalog into one transcript, stopping at the first failure.
pub fn run_all(out: &mut Transcript) -> Result<()> {
    for lesson in CATALOG {
        out.say(format!("== {} ==", lesson.title));
        (lesson.run)(out)?;
    }
    Ok(())
}

/// Frees a gadget the old-fashioned way: whoever receives the pointer
/// deletes it.
///
/// # Safety
///
/// `raw` must come from a `Box<Gadget>` and be owned by the caller.
unsafe fn legacy_use(raw: Option<NonNull<Gadget>>, out: &mut Transcript) {
    if let Some(raw) = raw {
        // Safety: forwarded to the caller.
        let gadget = unsafe { Box::from_raw(raw.as_ptr()) };
        out.say(gadget.use_it());
    }
}

fn basics(out: &mut Transcript) -> Result<()> {
    {
        let g = create_gadget();
        if let Some(line) = use_gadget(ExclusiveHandle::as_ref(&g)) {
            out.say(line);
        }
    }

    if let Some(line) = consume(create_gadget()) {
        out.say(line);
    }

    let g = create_gadget();
    out.say(format!("{} is owned here", g.name()));
    if let Some(line) = consume(g) {
        out.say(format!("{line} after an explicit move"));
    }
    Ok(())
}

fn transfer(out: &mut Transcript) -> Result<()> {
    let deleter = CountingDeleter::new();
    let make = |id: u32, name: &str| {
        let raw = NonNull::from(Box::leak(Box::new(Gadget::new(id, name))));
        // Safety: freshly leaked box.
        unsafe { ExclusiveHandle::from_raw_with_deleter(Some(raw), deleter.clone()) }
    };

    let mut a = make(1, "ipad");
    out.say(format!("a owns: {}", ExclusiveHandle::is_owning(&a)));

    let mut b = ExclusiveHandle::take(&mut a);
    out.say(format!(
        "after b = take(a): a owns {}, b -> {}",
        ExclusiveHandle::is_owning(&a),
        ExclusiveHandle::try_deref(&b)?
    ));

    let mut c = make(2, "smartwatch");
    ExclusiveHandle::transfer_from(&mut b, &mut c);
    out.say(format!(
        "after b <- c: b -> {}, c owns {}, destroyed so far {}",
        ExclusiveHandle::try_deref(&b)?,
        ExclusiveHandle::is_owning(&c),
        deleter.calls()
    ));

    let same = ExclusiveHandle::take(&mut b);
    ExclusiveHandle::assign(&mut b, same);
    out.say(format!(
        "self assignment keeps {}, destroyed so far {}",
        ExclusiveHandle::try_deref(&b)?,
        deleter.calls()
    ));

    drop((a, b, c));
    out.say(format!("destroyed in total {}", deleter.calls()));
    Ok(())
}

fn release_reset(out: &mut Transcript) -> Result<()> {
    let mut g = create_gadget();
    let raw = ExclusiveHandle::release(&mut g);
    out.say(format!("released, handle owns {}", ExclusiveHandle::is_owning(&g)));
    // Safety: the pointer was just released from a DefaultDelete handle.
    unsafe { legacy_use(raw, out) };

    let mut g = ExclusiveHandle::<Gadget>::empty();
    ExclusiveHandle::replace(&mut g, Box::new(Gadget::new(4, "roomba")));
    out.say(format!("reset on empty handle -> {}", ExclusiveHandle::try_deref(&g)?));

    ExclusiveHandle::reset_empty(&mut g);
    out.say(format!("after reset to empty, handle owns {}", ExclusiveHandle::is_owning(&g)));
    Ok(())
}

fn custom_deleter(out: &mut Transcript) -> Result<()> {
    let observer = Stream::new();
    {
        let _guard = stream_guard(observer.clone());
        out.say(format!("inside scope, stream open: {}", observer.is_open()));
    }
    out.say(format!("after scope, stream open: {}", observer.is_open()));

    // removed together with the file when `dir` goes out of scope
    let dir = tempfile::tempdir().map_err(|err| HandleError::io(std::env::temp_dir(), err))?;
    let path = dir.path().join("abc.txt");
    let outcome = write_text(&path, "text", true);
    out.say(format!(
        "write interrupted: {}, file still readable: {}",
        outcome.is_err(),
        fs::read_to_string(&path).is_ok()
    ));
    Ok(())
}

fn array(out: &mut Transcript) -> Result<()> {
    let mut data = vec![0; 1024];
    data[..4].copy_from_slice(&[1, 2, 3, 4]);

    let mut tab: ExclusiveHandle<[i32]> = data.into_boxed_slice().into();
    tab[100] = 562;
    tab[101] = 42;
    out.say(format!("tab[..4] = {:?}, tab[100..102] = {:?}", &tab[..4], &tab[100..102]));
    Ok(())
}

fn shared(out: &mut Transcript) -> Result<()> {
    let sp1 = ExclusiveHandle::into_shared(ExclusiveHandle::new(Gadget::new(1, "ipad1")))
        .ok_or(HandleError::Empty)?;
    out.say(format!("use count: {}", Rc::strong_count(&sp1)));

    let sp2 = Rc::clone(&sp1);
    out.say(format!("use count: {}", Rc::strong_count(&sp1)));

    let wp: Weak<Gadget> = Rc::downgrade(&sp1);
    drop(sp1);
    drop(sp2);
    out.say(format!("weak upgrade after reset: {}", wp.upgrade().is_some()));
    Ok(())
}

fn dataset(out: &mut Transcript) -> Result<()> {
    let mut data1 = Dataset::new("data1", &[1, 2, 3, 4, 5]);
    let backup = data1.clone();
    out.say(format!("backup - {:?}", backup.as_slice()));

    let mut target = data1.take();
    out.say(format!("target - {:?}, source left with {} items", target.as_slice(), data1.len()));

    target = Dataset::new("data2", &[34, 235, 643, 23, 46, 665]);
    out.say(format!("target - {:?}", target.as_slice()));

    let mut rows = DataRows::new("dataset", backup, target);
    let copy = rows.clone();
    let moved = rows.take();
    out.say(format!(
        "rows copied into {} and moved into {}",
        copy.name(),
        moved.name()
    ));
    Ok(())
}

fn forwarding(out: &mut Transcript) -> Result<()> {
    let mut g = Gadget::new(1, "g");
    let cg = Gadget::new(2, "const g");

    let calls = [
        use_pair(&mut g, &cg),
        use_pair(&cg, Gadget::new(3, "temporary gadget")),
        use_pair(Gadget::new(3, "temporary gadget"), Gadget::new(3, "temporary gadget")),
    ];
    for [(first, _), (second, _)] in calls {
        out.say(format!("have_fun({first}), have_fun({second})"));
    }
    Ok(())
}

fn owner(out: &mut Transcript) -> Result<()> {
    let jk = Owner::new("Jan Kowalski", create_gadget());
    if let Some(line) = jk.use_gadget() {
        out.say(line);
    }

    let mut other = jk;
    let gadget = other.hand_over();
    out.say(format!(
        "{} handed over {}, still has one: {}",
        other.name(),
        ExclusiveHandle::try_deref(&gadget)?,
        other.use_gadget().is_some()
    ));

    let gadgets = vec![ExclusiveHandle::new(Gadget::new(1, "ipad")), create_gadget(), gadget];
    let names: Vec<&str> = gadgets.iter().map(|g| g.name()).collect();
    out.say(names.join(" "));
    Ok(())
}

fn queue(out: &mut Transcript) -> Result<()> {
    let g = Gadget::new(1, "ipad");
    let mut queue: Queue<Gadget> = Queue::new();
    queue.push(&g);
    queue.push(Gadget::new(2, "smart-tv"));
    queue.emplace((3, "smart-watch"));
    out.say(format!("queued {} gadgets, still holding {}", queue.len(), g));

    let mut slot = Gadget::default();
    while queue.pop_into(&mut slot) {
        out.say(format!("popped {slot}"));
    }
    Ok(())
}

fn find_empty_pointer(out: &mut Transcript) -> Result<()> {
    let boxes = vec![Some(Box::new(9)), Some(Box::new(10)), None, Some(Box::new(20))];
    out.say(format!("first empty box at {:?}", find_empty(&boxes)));

    let shared = [Some(Rc::new(10)), None, Some(Rc::new(3))];
    out.say(format!("first empty shared pointer at {:?}", find_empty(&shared)));

    let handles = vec![
        ExclusiveHandle::new(Gadget::new(1, "ipad")),
        ExclusiveHandle::empty(),
        create_gadget(),
    ];
    out.say(format!("first empty handle at {:?}", find_empty(&handles)));

    let full = [Some(Rc::new(1)), Some(Rc::new(2))];
    out.say(format!("all owning: {}", find_empty(&full).is_none()));
    Ok(())
}

fn device(out: &mut Transcript) -> Result<()> {
    let printer = Device::new("printer");
    let mut devices = Vec::new();
    printer.register(&mut devices);
    printer.register(&mut devices);
    out.say(format!(
        "{} registered {} times, use count {}",
        printer.name(),
        devices.len(),
        Rc::strong_count(&printer)
    ));

    drop(devices);
    out.say(format!("after unregistering, use count {}", Rc::strong_count(&printer)));
    Ok(())
}
