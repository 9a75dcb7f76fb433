use anyhow::Result;

use question_gen_guard::utils::logging;
use question_gen_guard::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置（CONFIG_FILE 指定 TOML 文件, 其余走环境变量覆盖）
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::from_env(),
    };

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
