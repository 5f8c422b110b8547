mod command;
mod util;

fn main() -> anyhow::Result<()> {
    util::init_logging();
    command::run()
}
