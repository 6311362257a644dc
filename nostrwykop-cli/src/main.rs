//! Minimal CLI over nostrwykop-core: fetch the feed, posts, profiles and
//! conversations from real relays and print them as JSON.

use nostrwykop_core::nostr_sdk::Keys;
use nostrwykop_core::{ClientConfig, FeedOptions, NostrWykop, ProfileUpdate, SortBy};

const USAGE: &str = "\
usage: nostrwykop-cli [--relay <url>]... [--nsec <key>] <command> [args]

read commands:
  feed [newest|hot|active]    main feed
  followed <pubkey>           posts from everyone a key follows
  voted <pubkey> up|down      posts a key has reacted to
  saved <pubkey>              saved posts (always empty for now)
  post <id>                   single post by event id
  user <pubkey>               posts by one author
  comments <post-id>          comment tree under a post
  profile <pubkey>            profile snapshot
  following <pubkey>          who a key follows
  followers <pubkey>          who follows a key
  search <query>              recent-window full-text search
  dm-list                     conversation summaries (needs --nsec)
  dm <pubkey>                 one conversation thread (needs --nsec)

write commands (need --nsec):
  comment <post-id> <text>
  reply <comment-id> <text>
  vote <post-id> up|down
  follow <pubkey> | unfollow <pubkey>
  set-profile <name> [avatar] [about] [nip05]
  send <pubkey> <text>
  delete <message-id>

pubkeys are accepted in hex or npub form.";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let raw: Vec<String> = std::env::args().skip(1).collect();

    // Pull out the flags, leave positional args in order
    let mut relays = Vec::new();
    let mut nsec: Option<String> = None;
    let mut args = Vec::new();
    let mut it = raw.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--relay" => {
                relays.push(it.next().ok_or("--relay needs a url")?);
            }
            "--nsec" => {
                nsec = Some(it.next().ok_or("--nsec needs a key")?);
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ => args.push(arg),
        }
    }

    let command = match args.first() {
        Some(c) => c.clone(),
        None => {
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let mut config = ClientConfig::default();
    if !relays.is_empty() {
        config.relays = relays;
    }
    let keys = match nsec {
        Some(s) => Some(Keys::parse(&s)?),
        None => None,
    };

    let client = NostrWykop::with_config(config, keys);
    client.connect().await?;
    let result = dispatch(&client, &command, &args[1..]).await;
    client.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

async fn dispatch(
    client: &NostrWykop,
    command: &str,
    args: &[String],
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let arg = |i: usize, name: &str| -> Result<&str, String> {
        args.get(i)
            .map(|s| s.as_str())
            .ok_or_else(|| format!("missing argument: {}", name))
    };

    let value = match command {
        "feed" => {
            let options = FeedOptions {
                sort: SortBy::from(args.first().map(|s| s.as_str()).unwrap_or("newest")),
                ..Default::default()
            };
            serde_json::to_value(client.get_posts(&options).await?)?
        }
        "followed" => {
            serde_json::to_value(
                client
                    .get_following_feed(arg(0, "pubkey")?, &FeedOptions::default())
                    .await?,
            )?
        }
        "voted" => {
            let upvoted = match arg(1, "direction")? {
                "up" => true,
                "down" => false,
                other => return Err(format!("vote direction must be up or down, got {}", other).into()),
            };
            serde_json::to_value(client.get_user_voted_posts(arg(0, "pubkey")?, upvoted).await?)?
        }
        "saved" => serde_json::to_value(client.get_saved_posts(arg(0, "pubkey")?).await?)?,
        "post" => serde_json::to_value(client.get_post_by_id(arg(0, "id")?).await?)?,
        "user" => serde_json::to_value(client.get_user_posts(arg(0, "pubkey")?).await?)?,
        "comments" => serde_json::to_value(client.get_comments(arg(0, "post-id")?).await?)?,
        "profile" => serde_json::to_value(client.get_profile(arg(0, "pubkey")?).await?)?,
        "following" => serde_json::to_value(client.get_following(arg(0, "pubkey")?).await?)?,
        "followers" => serde_json::to_value(client.get_followers(arg(0, "pubkey")?).await?)?,
        "search" => {
            serde_json::to_value(
                client
                    .search_posts(arg(0, "query")?, &FeedOptions::default())
                    .await?,
            )?
        }
        "dm-list" => serde_json::to_value(client.get_conversations().await?)?,
        "dm" => serde_json::to_value(client.get_conversation(arg(0, "pubkey")?).await?)?,
        "comment" => {
            serde_json::to_value(client.add_comment(arg(0, "post-id")?, arg(1, "text")?).await?)?
        }
        "reply" => {
            serde_json::to_value(client.add_reply(arg(0, "comment-id")?, arg(1, "text")?).await?)?
        }
        "vote" => {
            let up = match arg(1, "direction")? {
                "up" => true,
                "down" => false,
                other => return Err(format!("vote direction must be up or down, got {}", other).into()),
            };
            client.vote_on_post(arg(0, "post-id")?, up).await?;
            serde_json::json!({ "ok": true })
        }
        "follow" => {
            client.follow(arg(0, "pubkey")?).await?;
            serde_json::json!({ "ok": true })
        }
        "unfollow" => {
            client.unfollow(arg(0, "pubkey")?).await?;
            serde_json::json!({ "ok": true })
        }
        "set-profile" => {
            let field = |i: usize| args.get(i).filter(|s| !s.is_empty()).cloned();
            let update = ProfileUpdate {
                name: Some(arg(0, "name")?.to_string()),
                avatar: field(1),
                about: field(2),
                nip05: field(3),
            };
            serde_json::to_value(client.update_profile(&update).await?)?
        }
        "send" => {
            serde_json::to_value(client.send_message(arg(0, "pubkey")?, arg(1, "text")?).await?)?
        }
        "delete" => {
            client.delete_message(arg(0, "message-id")?).await?;
            serde_json::json!({ "ok": true })
        }
        other => return Err(format!("unknown command: {}\n\n{}", other, USAGE).into()),
    };
    Ok(value)
}
