use {
    anyhow::Context as _,
    coshare::{Config, Scheduler, Status},
    tracing_subscriber::EnvFilter,
};

fn task(scheduler: &Scheduler, start: i32)
{
    for i in 0 .. 5 {
        let id = scheduler.running().expect("Tasks only run inside resume");
        println!("coroutine {id} : {}", start + i);
        scheduler.yield_now();
    }
}

fn main() -> anyhow::Result<()>
{
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("Read configuration")?;
    let scheduler = Scheduler::with_config(&config).context("Open scheduler")?;

    let co1 = scheduler.create(task, 42);
    let co2 = scheduler.create(task, 100);

    println!("main start");

    while scheduler.status(co1) != Status::Dead
        && scheduler.status(co2) != Status::Dead
    {
        scheduler.try_resume(co1)?;
        scheduler.try_resume(co2)?;
    }

    println!("main end");

    Ok(())
}
