#![no_main]

use arbitrary::Arbitrary;
use hostbind_reactive::{AutorunOptions, Observable, ReactionOptions, live_reactions, run_in_action};
use hostbind_runtime::{Bound, Class, Declarations, Level, Lifecycle, Phase, Trigger, react};
use libfuzzer_sys::fuzz_target;

struct Shell {
    charge: Observable<u8>,
}

impl Class for Shell {
    const NAME: &'static str = "Shell";

    fn declare(decl: &mut Declarations<Self>) {
        decl.autorun("glow", |shell| {
            let _ = shell.charge.get();
        })
        .reactor_with("spark", ReactionOptions::kept(), |shell| {
            let charge = shell.charge.clone();
            react(move |_| charge.get() % 3, |_, _| {})
        });
    }
}

struct Widget {
    shell: Shell,
    text: Observable<u8>,
}

impl Class for Widget {
    const NAME: &'static str = "Widget";

    fn declare(decl: &mut Declarations<Self>) {
        decl.autorun_with("glow", AutorunOptions::kept(), |widget| {
            let _ = widget.text.get();
        })
        .reactor("onText", |widget| {
            let text = widget.text.clone();
            react(move |_| text.get(), |_, _| {})
        });
    }

    fn parent(&self) -> Option<&dyn Level> {
        Some(&self.shell)
    }
}

impl Lifecycle for Widget {}

#[derive(Arbitrary, Debug)]
enum Event {
    Enable,
    Disable,
    Bind(bool),
    Destroy,
    Destruct,
    Write(u8, u8),
}

fuzz_target!(|events: Vec<Event>| {
    {
        let mut bound = Bound::new(Widget {
            shell: Shell {
                charge: Observable::new(0),
            },
            text: Observable::new(0),
        });
        for event in &events {
            match event {
                Event::Enable => {
                    let _ = bound.enable();
                }
                Event::Disable => {
                    let _ = bound.disable();
                }
                Event::Bind(forced) => {
                    let trigger = if *forced {
                        Trigger::manual()
                    } else {
                        Trigger::Enable
                    };
                    let _ = bound.bind_render(trigger);
                }
                Event::Destroy => bound.destroy(),
                Event::Destruct => {
                    let _ = bound.destruct();
                }
                Event::Write(charge, text) => {
                    let host = bound.host();
                    let _ = run_in_action(|| {
                        host.shell.charge.set(*charge)?;
                        host.text.set(*text)
                    });
                }
            }

            let binder = bound.binder();
            let disable = binder.disable_scope_names();
            for name in binder.destroy_scope_names() {
                assert!(!disable.contains(&name), "{name} live in both scopes");
            }
            assert_eq!(live_reactions(), binder.live_count());
            if bound.phase() == Phase::Destroyed {
                assert_eq!(binder.live_count(), 0);
            }
        }
    }
    assert_eq!(live_reactions(), 0);
});
