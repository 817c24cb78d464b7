#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Command {
    /// Run a research session for the positional query words.
    #[default]
    Research,
    Health,
    ListReports,
    ShowReport(String),
    ShowConfig,
    SetConfig { key: String, value: String },
}

#[derive(Debug, Clone, Default)]
pub struct Args {
    pub command: Command,
    pub api_url: Option<String>,
    pub output_dir: Option<String>,
    pub log_level: Option<String>,
    pub json: bool,
    pub save: bool,
    pub local: bool,
    pub verbose: bool,
    pub help: bool,
    pub version: bool,
    /// Query words for [`Command::Research`].
    pub messages: Vec<String>,
    /// First problem found while parsing, reported before anything runs.
    pub error: Option<String>,
}

impl Args {
    pub fn query(&self) -> String {
        self.messages.join(" ").trim().to_string()
    }

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            self.error = Some(message);
        }
    }
}

pub fn parse_args(args: &[String]) -> Args {
    let mut result = Args::default();
    let mut positionals = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => result.help = true,
            "--version" | "-v" => result.version = true,
            "--json" => result.json = true,
            "--save" | "-s" => result.save = true,
            "--local" | "-l" => result.local = true,
            "--verbose" => result.verbose = true,
            "--api-url" if i + 1 < args.len() => {
                i += 1;
                result.api_url = Some(args[i].clone());
            }
            "--output-dir" | "-o" if i + 1 < args.len() => {
                i += 1;
                result.output_dir = Some(args[i].clone());
                result.save = true;
            }
            "--log-level" if i + 1 < args.len() => {
                i += 1;
                result.log_level = Some(args[i].clone());
            }
            "--" => {
                // Everything after is query text, even words that look like commands
                result.messages.extend(args[i + 1..].iter().cloned());
                break;
            }
            v if v.starts_with('-') && v.len() > 1 => {
                result.fail(format!("Unknown or incomplete option: {v}"));
            }
            v => positionals.push(v.to_string()),
        }

        i += 1;
    }

    if result.messages.is_empty() {
        apply_command(&mut result, positionals);
    } else {
        // `--` was used; positionals before it are query words too
        positionals.append(&mut result.messages);
        result.messages = positionals;
    }

    result
}

fn apply_command(result: &mut Args, positionals: Vec<String>) {
    let mut words = positionals.into_iter();
    let Some(first) = words.next() else {
        return;
    };
    let rest: Vec<String> = words.collect();

    match first.as_str() {
        "health" if rest.is_empty() => result.command = Command::Health,
        "reports" => match rest.as_slice() {
            [] => result.command = Command::ListReports,
            [show, id] if show == "show" => result.command = Command::ShowReport(id.clone()),
            _ => result.fail("Usage: reports [show <id>]".to_string()),
        },
        "config" => match rest.as_slice() {
            [] => result.command = Command::ShowConfig,
            [set, key, value] if set == "set" => {
                result.command = Command::SetConfig {
                    key: key.clone(),
                    value: value.clone(),
                }
            }
            _ => result.fail("Usage: config [set <key> <value>]".to_string()),
        },
        _ => {
            result.messages.push(first);
            result.messages.extend(rest);
        }
    }
}

pub fn print_help(bin_name: &str) {
    println!(
        "{bin_name} - stream a research report from the research backend\n\n\
         Usage:\n  {bin_name} [options] <query...>\n  {bin_name} [options] -- <query...>\n\n\
         Commands:\n  {bin_name} health\n  {bin_name} reports\n  {bin_name} reports show <id>\n  {bin_name} config\n  {bin_name} config set <key> <value> [-l]\n\n\
         Options:\n  --api-url <url>\n  --output-dir, -o <dir>\n  --save, -s\n  --json\n  --log-level <filter>\n  --local, -l\n  --verbose\n  --help, -h\n  --version, -v\n\n\
         The query may also be piped on stdin."
    );
}
