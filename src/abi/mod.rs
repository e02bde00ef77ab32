use alloy::sol;

// Arc ID identity registry interface (subset used by the relay)
sol! {
    #[sol(rpc)]
    interface IArcIdRegistry {
        struct Agent {
            uint256 tokenId;
            address agentAddr;
            address creator;
            string agentURI;
            bool suspended;
            uint256 endorsements;
        }

        // Read-only accessors
        function getAgentById(uint256 agentId) external view returns (Agent memory);
        function getAgentByAddress(address agentAddr) external view returns (Agent memory);

        // Optional on older deployments, detected once at startup
        function isRegistered(address agentAddr) external view returns (bool);

        // Registration flow
        function register(address agentAddr, string calldata agentURI) external returns (uint256 tokenId);
        function submitApplication(address deployer, string calldata agentURI) external;
        function approveApplication(address agentAddr) external returns (uint256 tokenId);

        // Endorsements
        function requestEndorsement(uint256 agentId, address endorser) external;
        function endorse(uint256 agentId) external;

        // Events
        event EndorsementRequested(uint256 indexed agentId, address indexed agentAddr, address indexed endorser);
        event ApplicationSubmitted(address indexed agentAddr, address indexed deployer, string agentURI);
        event AgentRegistered(uint256 indexed tokenId, address indexed agentAddr, address indexed creator, string agentURI);

        // Errors
        error AgentNotFound();
        error AlreadyRegistered(address agentAddr);
    }
}
