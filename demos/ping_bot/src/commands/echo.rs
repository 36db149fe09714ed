use hikari::prelude::*;
use serde::Deserialize;

#[derive(Deserialize, Default)]
#[serde(default)]
struct EchoConfig {
    shout: bool,
}

pub struct Echo {
    shout: bool,
}

impl ModuleInit for Echo {
    fn init(ctx: &LoadContext) -> Self {
        let config: EchoConfig = ctx.get_config().unwrap_or_default();
        Self {
            shout: config.shout,
        }
    }
}

#[async_trait]
impl Command for Echo {
    fn info(&self) -> CommandInfo {
        CommandInfo::named("echo")
            .alias("say")
            .description("Repeats its arguments")
            .usage("echo <text...>")
            .category("Utility")
    }

    async fn handle(&self, ctx: Arc<MessageContext>, args: Vec<String>) -> HandlerResult {
        if args.is_empty() {
            ctx.reply(&format!("usage: {}echo <text...>", ctx.prefix())).await?;
            return Ok(());
        }

        let text = args.join(" ");
        let text = if self.shout { text.to_uppercase() } else { text };
        ctx.send(&text).await?;
        Ok(())
    }
}

export_module!(command Echo);
