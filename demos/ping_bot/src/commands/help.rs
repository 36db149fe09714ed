use std::fmt::Write;

use hikari::prelude::*;

/// Lists every category with its commands.
pub struct Help;

impl ModuleInit for Help {
    fn init(_ctx: &LoadContext) -> Self {
        Help
    }
}

#[async_trait]
impl Command for Help {
    fn info(&self) -> CommandInfo {
        CommandInfo::named("help")
            .alias("h")
            .description("Shows this list")
            .category("Utility")
    }

    async fn handle(&self, ctx: Arc<MessageContext>, _args: Vec<String>) -> HandlerResult {
        let registry = ctx.registry();
        let mut out = String::new();

        for category in registry.categories() {
            let description = category.info.map(|i| i.description.as_str()).unwrap_or("");
            writeln!(out, "{} {}", category.name, description)?;
            for name in category.commands {
                let Some(command) = registry.get(name) else {
                    continue;
                };
                let aliases = registry.aliases_of(name);
                if aliases.is_empty() {
                    writeln!(out, "  {}{name}  {}", ctx.prefix(), command.description())?;
                } else {
                    writeln!(
                        out,
                        "  {}{name} ({})  {}",
                        ctx.prefix(),
                        aliases.join(", "),
                        command.description()
                    )?;
                }
            }
        }

        ctx.reply(out.trim_end()).await?;
        Ok(())
    }
}

export_module!(command Help);
