//! mcw 命令行入口
//!
//! stdout 只输出结果（地址、密文、交易 ID），日志写 stderr 或日志文件

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use multichain_wallet::{
    config::Config,
    domain::{
        chain_config::{AddressFormat, ChainId, Network},
        transaction::{parse_amount, FeeOptions},
        wallet::WalletRecord,
    },
    infrastructure::logging::init_logging,
    service::{NetworkHandle, WalletLifecycleManager, WalletSession},
};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

/// 多链钱包命令行工具（BTC / ETH）
#[derive(Parser)]
#[command(name = "mcw")]
#[command(about = "Multi-chain wallet: key lifecycle and transfers for BTC and ETH")]
#[command(version)]
struct Cli {
    /// TOML 配置文件（缺省读取 CONFIG_PATH）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 网络（覆盖配置中的链默认网络）
    #[arg(long, global = true)]
    network: Option<Network>,

    #[command(subcommand)]
    command: TopCommand,
}

#[derive(Subcommand)]
enum TopCommand {
    /// 生成 12 词助记词
    Generate,
    /// Bitcoin 操作
    Btc {
        #[command(subcommand)]
        command: ChainCommand,
    },
    /// Ethereum 操作
    Eth {
        #[command(subcommand)]
        command: ChainCommand,
    },
}

#[derive(Subcommand)]
enum ChainCommand {
    /// 从助记词创建钱包，可选择立即加密
    Create {
        /// 助记词（缺省时提示输入）
        #[arg(long)]
        mnemonic: Option<String>,
        /// BTC 地址格式
        #[arg(long)]
        format: Option<AddressFormat>,
        /// 创建后立即加密私钥
        #[arg(long)]
        encrypt: bool,
        /// 加密密码（缺省时自动生成）
        #[arg(long, requires = "encrypt")]
        password: Option<String>,
    },
    /// 查询余额
    Balance { address: String },
    /// 加密私钥（64 位十六进制或 WIF）
    Encrypt {
        /// 私钥（缺省时提示输入）
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        format: Option<AddressFormat>,
        /// 加密密码（缺省时自动生成）
        #[arg(long)]
        password: Option<String>,
    },
    /// 解密私钥
    Decrypt {
        #[command(flatten)]
        wallet: EncryptedWalletArgs,
    },
    /// 发送交易
    Send {
        #[command(flatten)]
        wallet: EncryptedWalletArgs,
        /// 收款地址
        #[arg(long)]
        to: String,
        /// 金额（整币单位）
        #[arg(long)]
        amount: String,
        /// BTC 固定手续费（satoshi）
        #[arg(long)]
        fee_sats: Option<u64>,
        /// ETH gas limit
        #[arg(long)]
        gas_limit: Option<u64>,
        /// ETH gas price（gwei）
        #[arg(long)]
        gas_price_gwei: Option<u64>,
    },
    /// 查询交易状态
    Tx { tx_id: String },
    /// 按指定格式显示 BTC 地址
    Format {
        format: AddressFormat,
        /// 助记词（缺省时提示输入）
        #[arg(long)]
        mnemonic: Option<String>,
    },
    /// 显示当前网络与网关
    Network,
}

/// 已加密钱包的参数
#[derive(Args)]
struct EncryptedWalletArgs {
    /// 钱包地址
    #[arg(long)]
    address: String,
    /// 密文（十六进制）
    #[arg(long)]
    ciphertext: String,
    /// BTC 地址格式（缺省按地址推断）
    #[arg(long)]
    format: Option<AddressFormat>,
    /// 解密密码（缺省时提示输入）
    #[arg(long)]
    password: Option<String>,
}

/// 从参数或无回显提示读取秘密
fn read_secret(value: Option<String>, prompt: &str) -> Result<Zeroizing<String>> {
    let secret = match value {
        Some(v) => Zeroizing::new(v),
        None => Zeroizing::new(rpassword::prompt_password(prompt).context("Failed to read input")?),
    };
    if secret.trim().is_empty() {
        anyhow::bail!("input cannot be empty");
    }
    Ok(secret)
}

struct AppContext {
    config: Config,
    lifecycle: Arc<WalletLifecycleManager>,
    network_override: Option<Network>,
}

impl AppContext {
    fn network_for(&self, chain: ChainId) -> Network {
        self.network_override.unwrap_or(match chain {
            ChainId::Btc => self.config.bitcoin.network,
            ChainId::Eth => self.config.ethereum.network,
        })
    }

    fn session(&self, chain: ChainId) -> Result<WalletSession> {
        let handle = NetworkHandle::from_config(chain, self.network_for(chain), &self.config)
            .context("Failed to create chain gateway")?;
        Ok(WalletSession::new(handle, self.lifecycle.clone()))
    }

    /// 由命令行参数还原已加密钱包
    fn encrypted_wallet(&self, chain: ChainId, args: &EncryptedWalletArgs) -> Result<WalletRecord> {
        let network = self.network_for(chain);
        let format = match chain {
            ChainId::Eth => AddressFormat::Legacy,
            ChainId::Btc => match args.format {
                Some(f) => f,
                None => multichain_wallet::utils::AddressValidator::detect_bitcoin_format(
                    &args.address,
                    network,
                )
                .with_context(|| format!("Cannot infer address format of {}", args.address))?,
            },
        };
        let ciphertext = hex::decode(args.ciphertext.trim().trim_start_matches("0x"))
            .context("Ciphertext must be hex")?;

        Ok(WalletRecord::from_ciphertext(
            args.address.trim(),
            chain,
            network,
            format,
            ciphertext,
            self.lifecycle.kdf(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ✅ 1. 加载环境变量
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // ✅ 2. 加载配置
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("CONFIG_PATH").ok().map(PathBuf::from));
    let config = Config::from_env_and_file(config_path.as_ref())?;
    config.validate().context("Invalid configuration")?;

    // ✅ 3. 初始化日志
    init_logging(&config.logging)?;

    let ctx = AppContext {
        lifecycle: Arc::new(WalletLifecycleManager::from_config(&config.services)),
        config,
        network_override: cli.network,
    };

    match cli.command {
        TopCommand::Generate => {
            let mnemonic = ctx.lifecycle.generate_mnemonic().await?;
            println!("{}", mnemonic.as_str());
            Ok(())
        }
        TopCommand::Btc { command } => run_chain(&ctx, ChainId::Btc, command).await,
        TopCommand::Eth { command } => run_chain(&ctx, ChainId::Eth, command).await,
    }
}

async fn run_chain(ctx: &AppContext, chain: ChainId, command: ChainCommand) -> Result<()> {
    match command {
        ChainCommand::Create {
            mnemonic,
            format,
            encrypt,
            password,
        } => {
            let mnemonic = read_secret(mnemonic, "Mnemonic: ")?;
            let mut session = ctx.session(chain)?;
            if let Some(format) = format {
                session.set_format(format)?;
            }
            session.create_wallet(&mnemonic).await?;

            let record = session
                .wallet_mut()
                .context("Wallet was not created")?;
            println!("Address: {}", record.address);

            if encrypt {
                let envelope = ctx.lifecycle.lock(record, password.as_deref()).await?;
                println!("Ciphertext: {}", envelope.ciphertext_hex());
                if envelope.generated {
                    println!("Password: {}", envelope.password_reference.as_str());
                }
            }
            Ok(())
        }

        ChainCommand::Balance { address } => {
            let session = ctx.session(chain)?;
            let balance = session.orchestrator().balance(&address).await?;
            println!("{} {}", balance.display, chain.symbol());
            Ok(())
        }

        ChainCommand::Encrypt {
            key,
            format,
            password,
        } => {
            let key = read_secret(key, "Private key: ")?;
            let mut record = ctx
                .lifecycle
                .import(&key, chain, format, ctx.network_for(chain))?;
            let envelope = ctx.lifecycle.lock(&mut record, password.as_deref()).await?;

            println!("Address: {}", record.address);
            println!("Ciphertext: {}", envelope.ciphertext_hex());
            if envelope.generated {
                println!("Password: {}", envelope.password_reference.as_str());
            }
            Ok(())
        }

        ChainCommand::Decrypt { wallet } => {
            let mut record = ctx.encrypted_wallet(chain, &wallet)?;
            let password = read_secret(wallet.password, "Password: ")?;
            ctx.lifecycle.unlock(&mut record, &password).await?;

            if let multichain_wallet::domain::KeyState::PlaintextKey(key) = &record.key_state {
                println!("Address: {}", record.address);
                println!("Private Key: {}", key.to_hex().as_str());
            }
            Ok(())
        }

        ChainCommand::Send {
            wallet,
            to,
            amount,
            fee_sats,
            gas_limit,
            gas_price_gwei,
        } => {
            let mut session = ctx.session(chain)?;
            let record = ctx.encrypted_wallet(chain, &wallet)?;
            session.load_wallet(record)?;

            let orchestrator = session.orchestrator();
            let options = FeeOptions {
                btc_fee_sats: fee_sats,
                gas_limit,
                gas_price_gwei,
            };
            let request = orchestrator
                .prepare_request(&to, parse_amount(&amount)?, options)
                .await?;
            let password = read_secret(wallet.password, "Password: ")?;

            // Ctrl-C 在阶段之间取消发送
            let cancel = CancellationToken::new();
            let watcher = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                })
            };

            let record = session.wallet().context("Wallet was not loaded")?;
            let result = orchestrator
                .send(record, &request, Some(&password), Some(&cancel))
                .await;
            watcher.abort();

            let handle = result?;
            println!("Transaction ID: {}", handle.tx_id);
            println!("Status: {}", handle.status);
            Ok(())
        }

        ChainCommand::Tx { tx_id } => {
            let session = ctx.session(chain)?;
            let report = session.orchestrator().query_status(tx_id.trim()).await;
            println!("Status: {}", report.status);
            if let Some(confirmations) = report.confirmations {
                println!("Confirmations: {}", confirmations);
            }
            Ok(())
        }

        ChainCommand::Format { format, mnemonic } => {
            let mnemonic = read_secret(mnemonic, "Mnemonic: ")?;
            let mut session = ctx.session(chain)?;
            session.create_wallet(&mnemonic).await?;
            session.set_format(format)?;

            let record = session.wallet().context("Wallet was not created")?;
            println!("{} Address: {}", record.address_format, record.address);
            Ok(())
        }

        ChainCommand::Network => {
            let session = ctx.session(chain)?;
            let endpoint = match chain {
                ChainId::Btc => ctx.config.bitcoin.esplora_url_for(session.network()),
                ChainId::Eth => ctx.config.ethereum.rpc_url_for(session.network()),
            };
            println!("Chain: {}", chain);
            println!("Network: {}", session.network());
            println!("Endpoint: {}", endpoint);
            Ok(())
        }
    }
}
